// 该文件是 Huaban （画板） 项目的一部分。
// src/cv.rs - 图像处理基础能力：二值化、外轮廓提取、区域插值缩放
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

use image::{GrayImage, Luma, imageops};
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use thiserror::Error;

use crate::frame::BoundingBox;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResizeError {
  #[error("裁剪区域为空: {width}x{height}")]
  EmptySource { width: u32, height: u32 },
  #[error("目标尺寸为空: {width}x{height}")]
  EmptyTarget { width: u32, height: u32 },
  #[error("缩放结果尺寸不符: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

/// 二值平面：墨迹为 255，背景为 0
#[derive(Debug, Clone)]
pub struct BinaryPlane {
  image: GrayImage,
}

impl BinaryPlane {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn as_image(&self) -> &GrayImage {
    &self.image
  }

  pub fn is_foreground(&self, x: u32, y: u32) -> bool {
    self.image.get_pixel(x, y)[0] == FOREGROUND
  }

  /// 按包围盒裁剪出一块独立的缓冲区
  pub fn crop(&self, bbox: &BoundingBox) -> GrayImage {
    imageops::crop_imm(&self.image, bbox.x, bbox.y, bbox.width, bbox.height).to_image()
  }
}

impl From<GrayImage> for BinaryPlane {
  /// 非零像素视为墨迹
  fn from(mut image: GrayImage) -> Self {
    for pixel in image.pixels_mut() {
      if pixel[0] != BACKGROUND {
        *pixel = Luma([FOREGROUND]);
      }
    }
    Self { image }
  }
}

/// 使用 Otsu 全局阈值二值化，深色笔迹成为前景。
pub fn binarize(gray: &GrayImage) -> BinaryPlane {
  let (min, max) = gray
    .pixels()
    .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

  // 单一亮度的画面不存在可分割的前景
  if min >= max {
    return BinaryPlane {
      image: GrayImage::new(gray.width(), gray.height()),
    };
  }

  let level = otsu_level(gray);
  BinaryPlane {
    image: threshold(gray, level, ThresholdType::BinaryInverted),
  }
}

/// 提取最外层连通前景的包围盒，不包含孔洞及孔洞内部的嵌套区域。
///
/// 返回顺序为发现顺序（自上而下、自左而右扫描）。
pub fn find_outer_components(plane: &BinaryPlane) -> Vec<BoundingBox> {
  // 外轮廓跟踪要求前景左侧存在背景像素，因此四周补一圈背景
  let padded = {
    let mut padded = GrayImage::new(plane.width() + 2, plane.height() + 2);
    imageops::replace(&mut padded, plane.as_image(), 1, 1);
    padded
  };

  find_contours::<u32>(&padded)
    .into_iter()
    .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    .filter_map(|c| {
      let (mut x_min, mut y_min) = (u32::MAX, u32::MAX);
      let (mut x_max, mut y_max) = (0u32, 0u32);
      for p in &c.points {
        x_min = x_min.min(p.x);
        y_min = y_min.min(p.y);
        x_max = x_max.max(p.x);
        y_max = y_max.max(p.y);
      }
      if c.points.is_empty() {
        return None;
      }
      Some(BoundingBox::new(
        x_min - 1,
        y_min - 1,
        x_max - x_min + 1,
        y_max - y_min + 1,
      ))
    })
    .collect()
}

/// 区域平均插值缩放。
///
/// 每个目标像素取其覆盖的源像素按面积加权的均值，缩小粗笔画时可减少混叠。
pub fn resize_area(source: &GrayImage, width: u32, height: u32) -> Result<GrayImage, ResizeError> {
  let (sw, sh) = source.dimensions();
  if sw == 0 || sh == 0 {
    return Err(ResizeError::EmptySource {
      width: sw,
      height: sh,
    });
  }
  if width == 0 || height == 0 {
    return Err(ResizeError::EmptyTarget { width, height });
  }

  let sx = sw as f64 / width as f64;
  let sy = sh as f64 / height as f64;
  let cell_area = sx * sy;

  let mut out = GrayImage::new(width, height);
  for ty in 0..height {
    let y0 = ty as f64 * sy;
    let y1 = y0 + sy;
    for tx in 0..width {
      let x0 = tx as f64 * sx;
      let x1 = x0 + sx;

      let mut acc = 0.0f64;
      let mut yy = y0.floor() as u32;
      while (yy as f64) < y1 && yy < sh {
        let wy = (y1.min(yy as f64 + 1.0) - y0.max(yy as f64)).max(0.0);
        let mut xx = x0.floor() as u32;
        while (xx as f64) < x1 && xx < sw {
          let wx = (x1.min(xx as f64 + 1.0) - x0.max(xx as f64)).max(0.0);
          acc += wx * wy * source.get_pixel(xx, yy)[0] as f64;
          xx += 1;
        }
        yy += 1;
      }

      let value = (acc / cell_area).round().clamp(0.0, 255.0) as u8;
      out.put_pixel(tx, ty, Luma([value]));
    }
  }

  if out.dimensions() != (width, height) {
    return Err(ResizeError::ShapeMismatch {
      expected: (width, height),
      actual: out.dimensions(),
    });
  }
  Ok(out)
}
