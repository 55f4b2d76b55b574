// 该文件是 Huaban （画板） 项目的一部分。
// src/normalize.rs - 字形归一化
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

use image::GrayImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  cv::{self, ResizeError},
  segment::GlyphRegion,
};

pub const SAMPLE_SIZE: u32 = 28;
const INTENSITY_RANGE: f32 = 255.0;

/// 分类器期望的输入形状，数据按 HWC 排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleShape {
  pub width: u32,
  pub height: u32,
  pub channels: u32,
}

impl Default for SampleShape {
  fn default() -> Self {
    Self {
      width: SAMPLE_SIZE,
      height: SAMPLE_SIZE,
      channels: 1,
    }
  }
}

impl SampleShape {
  pub fn new(width: u32, height: u32, channels: u32) -> Self {
    Self {
      width,
      height,
      channels,
    }
  }

  pub fn len(&self) -> usize {
    self.width as usize * self.height as usize * self.channels as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
  #[error("缩放失败: {0}")]
  Resize(#[from] ResizeError),
  #[error("输入形状无效: {0:?}")]
  InvalidShape(SampleShape),
}

/// 固定形状、取值在 [0, 1] 的单个字形样本，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSample {
  shape: SampleShape,
  data: Box<[f32]>,
}

impl NormalizedSample {
  pub fn shape(&self) -> SampleShape {
    self.shape
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn get(&self, x: u32, y: u32, channel: u32) -> f32 {
    let idx = ((y * self.shape.width + x) * self.shape.channels + channel) as usize;
    self.data[idx]
  }
}

#[derive(Debug, Clone, Default)]
pub struct GlyphNormalizer {
  shape: SampleShape,
}

impl GlyphNormalizer {
  pub fn new(shape: SampleShape) -> Self {
    Self { shape }
  }

  pub fn shape(&self) -> SampleShape {
    self.shape
  }

  /// 裁剪、缩放、复制通道并缩放到 [0, 1]。
  ///
  /// 中间缓冲区只在本次调用内存活，任何返回路径上都会被释放。
  pub fn normalize(&self, region: &GlyphRegion<'_>) -> Result<NormalizedSample, NormalizationError> {
    let crop = region.pixels();
    debug!(
      "归一化字形 #{} {:?} -> {}x{}x{}",
      region.discovery, region.bbox, self.shape.width, self.shape.height, self.shape.channels
    );
    self.normalize_pixels(&crop)
  }

  pub fn normalize_pixels(&self, crop: &GrayImage) -> Result<NormalizedSample, NormalizationError> {
    if self.shape.is_empty() {
      return Err(NormalizationError::InvalidShape(self.shape));
    }

    let resized = cv::resize_area(crop, self.shape.width, self.shape.height)?;
    let channels = self.shape.channels as usize;

    let mut data = Vec::with_capacity(self.shape.len());
    for pixel in resized.pixels() {
      let value = (pixel[0] as f32 / INTENSITY_RANGE).clamp(0.0, 1.0);
      data.extend(std::iter::repeat_n(value, channels));
    }

    if data.len() != self.shape.len() {
      return Err(NormalizationError::Resize(ResizeError::ShapeMismatch {
        expected: (self.shape.width, self.shape.height),
        actual: resized.dimensions(),
      }));
    }

    Ok(NormalizedSample {
      shape: self.shape,
      data: data.into_boxed_slice(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Luma;

  fn check_sample(sample: &NormalizedSample, shape: SampleShape) {
    assert_eq!(sample.shape(), shape);
    assert_eq!(sample.as_slice().len(), shape.len());
    assert!(sample.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
  }

  #[test]
  fn all_foreground_crop_is_ones() {
    let normalizer = GlyphNormalizer::default();
    let sample = normalizer
      .normalize_pixels(&GrayImage::from_pixel(40, 60, Luma([255])))
      .unwrap();
    check_sample(&sample, SampleShape::default());
    assert!(sample.as_slice().iter().all(|v| *v == 1.0));
  }

  #[test]
  fn all_background_crop_is_zeros() {
    let normalizer = GlyphNormalizer::default();
    let sample = normalizer
      .normalize_pixels(&GrayImage::new(21, 300))
      .unwrap();
    check_sample(&sample, SampleShape::default());
    assert!(sample.as_slice().iter().all(|v| *v == 0.0));
  }

  #[test]
  fn channels_are_replicated() {
    let shape = SampleShape::new(28, 28, 3);
    let mut crop = GrayImage::new(56, 56);
    for y in 0..56 {
      for x in 0..28 {
        crop.put_pixel(x, y, Luma([255]));
      }
    }
    let sample = GlyphNormalizer::new(shape).normalize_pixels(&crop).unwrap();
    check_sample(&sample, shape);
    for c in 0..3 {
      assert_eq!(sample.get(0, 0, c), 1.0);
      assert_eq!(sample.get(27, 27, c), 0.0);
    }
  }

  #[test]
  fn zero_area_crop_is_rejected() {
    let err = GlyphNormalizer::default()
      .normalize_pixels(&GrayImage::new(0, 10))
      .unwrap_err();
    assert!(matches!(
      err,
      NormalizationError::Resize(ResizeError::EmptySource { .. })
    ));
  }

  #[test]
  fn empty_shape_is_rejected() {
    let err = GlyphNormalizer::new(SampleShape::new(28, 28, 0))
      .normalize_pixels(&GrayImage::new(10, 10))
      .unwrap_err();
    assert!(matches!(err, NormalizationError::InvalidShape(_)));
  }
}
