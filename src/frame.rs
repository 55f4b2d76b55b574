// 该文件是 Huaban （画板） 项目的一部分。
// src/frame.rs - 画板快照帧定义
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

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use thiserror::Error;

const RGBA_CHANNELS: usize = 4;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 轴对齐包围盒，像素坐标，左上角为原点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl BoundingBox {
  pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn right(&self) -> u32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> u32 {
    self.y + self.height
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn center(&self) -> (f32, f32) {
    (
      self.x as f32 + self.width as f32 / 2.0,
      self.y as f32 + self.height as f32 / 2.0,
    )
  }

  pub fn contains(&self, x: u32, y: u32) -> bool {
    x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
  }

  /// 裁剪到 `width` x `height` 的画面范围内
  pub fn clamp_to(&self, width: u32, height: u32) -> BoundingBox {
    let x = self.x.min(width);
    let y = self.y.min(height);
    BoundingBox {
      x,
      y,
      width: self.right().min(width) - x,
      height: self.bottom().min(height) - y,
    }
  }
}

/// 某一时刻画板像素的只读快照。
///
/// 每次推理捕获一次，之后各阶段只读取，不做修改。
#[derive(Debug, Clone)]
pub struct RasterFrame {
  image: DynamicImage,
}

impl RasterFrame {
  /// 从 RGBA 原始字节构造快照
  pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGBA_CHANNELS * width as usize * height as usize;
    let actual = data.len();
    if actual != expected {
      return Err(FrameError::LengthMismatch { expected, actual });
    }

    let image = RgbaImage::from_raw(width, height, data)
      .ok_or(FrameError::LengthMismatch { expected, actual })?;
    Ok(Self {
      image: DynamicImage::ImageRgba8(image),
    })
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }

  /// 转为单通道灰度平面
  pub fn to_luma(&self) -> GrayImage {
    self.image.to_luma8()
  }
}

impl From<RgbImage> for RasterFrame {
  fn from(image: RgbImage) -> Self {
    Self {
      image: DynamicImage::ImageRgb8(image),
    }
  }
}

impl From<GrayImage> for RasterFrame {
  fn from(image: GrayImage) -> Self {
    Self {
      image: DynamicImage::ImageLuma8(image),
    }
  }
}

impl From<RgbaImage> for RasterFrame {
  fn from(image: RgbaImage) -> Self {
    Self {
      image: DynamicImage::ImageRgba8(image),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rgba_length_is_checked() {
    let err = RasterFrame::from_rgba(2, 2, vec![0u8; 15]).unwrap_err();
    assert!(matches!(
      err,
      FrameError::LengthMismatch {
        expected: 16,
        actual: 15
      }
    ));
    assert!(RasterFrame::from_rgba(2, 2, vec![255u8; 16]).is_ok());
  }

  #[test]
  fn bbox_clamps_to_frame() {
    let bbox = BoundingBox::new(90, 5, 20, 10).clamp_to(100, 10);
    assert_eq!(bbox, BoundingBox::new(90, 5, 10, 5));

    let outside = BoundingBox::new(120, 20, 5, 5).clamp_to(100, 10);
    assert!(outside.is_empty());
  }
}
