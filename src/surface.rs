// 该文件是 Huaban （画板） 项目的一部分。
// src/surface.rs - 画板
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use ab_glyph::InvalidFont;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_filled_rect_mut},
  rect::Rect,
};

use crate::{
  frame::{BoundingBox, Point, RasterFrame},
  output::draw::Draw,
};

pub const BACKGROUND_COLOR: [u8; 3] = [255, 255, 255];
pub const INK_COLOR: [u8; 3] = [0, 0, 0];
pub const DEFAULT_STROKE_WIDTH: f32 = 15.0;

/// 可绘制的画板，推理流水线通过它读取快照并回写结果
pub trait DrawingSurface {
  fn dimensions(&self) -> (u32, u32);

  /// 当前墨迹的快照
  fn current_frame(&self) -> RasterFrame;

  /// 用背景色重绘包围盒覆盖的区域
  fn clear_region(&mut self, bbox: &BoundingBox);

  /// 在包围盒内居中绘制标签
  fn draw_label(&mut self, bbox: &BoundingBox, text: &str);

  fn clear_all(&mut self);

  fn begin_stroke(&mut self, at: Point);

  /// 返回本次采样是否留下了墨迹
  fn extend_stroke(&mut self, to: Point) -> bool;

  fn end_stroke(&mut self);
}

/// 基于内存位图的画板。
///
/// 墨迹与标签分两层保存：快照只包含墨迹，已标注的字符不会被再次分割。
pub struct Canvas {
  ink: RgbImage,
  annotations: RgbaImage,
  draw: Draw,
  stroke_width: f32,
  last: Option<Point>,
}

impl Canvas {
  pub fn new(width: u32, height: u32) -> Result<Self, InvalidFont> {
    Self::from_image(RgbImage::from_pixel(width, height, Rgb(BACKGROUND_COLOR)))
  }

  /// 以已有图像作为墨迹层
  pub fn from_image(ink: RgbImage) -> Result<Self, InvalidFont> {
    let (width, height) = ink.dimensions();
    Ok(Self {
      ink,
      annotations: RgbaImage::new(width, height),
      draw: Draw::new()?,
      stroke_width: DEFAULT_STROKE_WIDTH,
      last: None,
    })
  }

  pub fn with_stroke_width(mut self, stroke_width: f32) -> Self {
    self.stroke_width = stroke_width;
    self
  }

  pub fn ink(&self) -> &RgbImage {
    &self.ink
  }

  pub fn annotations(&self) -> &RgbaImage {
    &self.annotations
  }

  /// 合成墨迹层与标签层，用于显示或保存
  pub fn composite(&self) -> RgbImage {
    let mut out = self.ink.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
      let Rgba([r, g, b, a]) = *self.annotations.get_pixel(x, y);
      if a == 0 {
        continue;
      }
      let alpha = a as f32 / 255.0;
      for (c, top) in pixel.0.iter_mut().zip([r, g, b]) {
        *c = (*c as f32 * (1.0 - alpha) + top as f32 * alpha).round() as u8;
      }
    }
    out
  }

  /// 以圆头粗线连接两点
  pub fn paint_segment(&mut self, from: Point, to: Point) {
    let radius = (self.stroke_width / 2.0).max(0.5);
    let length = ((to.x - from.x).powi(2) + (to.y - from.y).powi(2)).sqrt();
    let steps = length.ceil().max(1.0) as u32;
    for i in 0..=steps {
      let t = i as f32 / steps as f32;
      let x = from.x + (to.x - from.x) * t;
      let y = from.y + (to.y - from.y) * t;
      draw_filled_circle_mut(
        &mut self.ink,
        (x.round() as i32, y.round() as i32),
        radius.round() as i32,
        Rgb(INK_COLOR),
      );
    }
  }

  fn rect_of(&self, bbox: &BoundingBox) -> Option<Rect> {
    let bbox = bbox.clamp_to(self.ink.width(), self.ink.height());
    if bbox.is_empty() {
      return None;
    }
    Some(Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height))
  }
}

impl DrawingSurface for Canvas {
  fn dimensions(&self) -> (u32, u32) {
    self.ink.dimensions()
  }

  fn current_frame(&self) -> RasterFrame {
    RasterFrame::from(self.ink.clone())
  }

  fn clear_region(&mut self, bbox: &BoundingBox) {
    if let Some(rect) = self.rect_of(bbox) {
      draw_filled_rect_mut(&mut self.ink, rect, Rgb(BACKGROUND_COLOR));
      draw_filled_rect_mut(&mut self.annotations, rect, Rgba([0, 0, 0, 0]));
    }
  }

  fn draw_label(&mut self, bbox: &BoundingBox, text: &str) {
    let bbox = bbox.clamp_to(self.ink.width(), self.ink.height());
    if bbox.is_empty() {
      return;
    }

    let Rgb([r, g, b]) = self.draw.label_color();
    let tile = self.draw.label_coverage(bbox.width, bbox.height, text);
    for (x, y, coverage) in tile.enumerate_pixels() {
      self
        .annotations
        .put_pixel(bbox.x + x, bbox.y + y, Rgba([r, g, b, coverage[0]]));
    }
  }

  fn clear_all(&mut self) {
    for pixel in self.ink.pixels_mut() {
      *pixel = Rgb(BACKGROUND_COLOR);
    }
    for pixel in self.annotations.pixels_mut() {
      *pixel = Rgba([0, 0, 0, 0]);
    }
    self.last = None;
  }

  fn begin_stroke(&mut self, at: Point) {
    self.last = Some(at);
  }

  fn extend_stroke(&mut self, to: Point) -> bool {
    match self.last.replace(to) {
      Some(from) => {
        self.paint_segment(from, to);
        true
      }
      None => {
        self.last = None;
        false
      }
    }
  }

  fn end_stroke(&mut self) {
    self.last = None;
  }
}
