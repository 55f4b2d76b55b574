// 该文件是 Huaban （画板） 项目的一部分。
// src/output/draw.rs - 识别标签绘制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ab_glyph::{Font, FontArc, InvalidFont, PxScale, ScaleFont};
use image::{GrayImage, Luma, Rgb};
use imageproc::drawing::{draw_text_mut, text_size};

const LABEL_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色

pub struct Draw {
  font: FontArc,
  label_color: Rgb<u8>,
}

impl Draw {
  pub fn new() -> Result<Self, InvalidFont> {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;

    Ok(Self {
      font,
      label_color: Rgb(LABEL_COLOR),
    })
  }

  pub fn with_label_color(mut self, color: [u8; 3]) -> Self {
    self.label_color = Rgb(color);
    self
  }

  pub fn label_color(&self) -> Rgb<u8> {
    self.label_color
  }

  /// 生成 `width` x `height` 的覆盖度图，文本居中，字号取较短边。
  ///
  /// 超出图块的部分被裁掉，文本不会越出所给的区域。
  pub fn label_coverage(&self, width: u32, height: u32, text: &str) -> GrayImage {
    let mut tile = GrayImage::new(width, height);
    let size = width.min(height);
    if size == 0 {
      return tile;
    }

    let scale = PxScale::from(size as f32);
    let (text_width, text_height) = text_size(scale, &self.font, text);
    if text_width == 0 || text_height == 0 {
      return tile;
    }

    // 字形落在基线上，墨迹顶部位于 ascent - text_height 处
    let ascent = self.font.as_scaled(scale).ascent();
    let x = (width as i32 - text_width as i32) / 2;
    let y = (height as i32 - text_height as i32) / 2 - (ascent - text_height as f32).round() as i32;

    draw_text_mut(&mut tile, Luma([255]), x, y, scale, &self.font, text);
    tile
  }
}
