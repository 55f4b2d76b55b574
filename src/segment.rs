// 该文件是 Huaban （画板） 项目的一部分。
// src/segment.rs - 字形分割
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
  cv::{self, BinaryPlane},
  frame::{BoundingBox, RasterFrame},
};

pub const DEFAULT_MIN_EXTENT: u32 = 20;

#[derive(Error, Debug)]
pub enum SegmentationError {
  #[error("快照为空: {width}x{height}")]
  EmptyFrame { width: u32, height: u32 },
  #[error("二值平面尺寸与快照不符: 快照 {frame:?}, 平面 {plane:?}")]
  PlaneMismatch { frame: (u32, u32), plane: (u32, u32) },
}

/// 一个候选字形：外轮廓包围盒及其所在的二值平面
#[derive(Debug, Clone, Copy)]
pub struct GlyphRegion<'p> {
  pub bbox: BoundingBox,
  /// 在轮廓扫描中的发现顺序，用于左边缘相同时稳定排序
  pub discovery: usize,
  source: &'p BinaryPlane,
}

impl<'p> GlyphRegion<'p> {
  pub fn source(&self) -> &'p BinaryPlane {
    self.source
  }

  /// 裁剪出该字形的二值像素
  pub fn pixels(&self) -> GrayImage {
    self.source.crop(&self.bbox)
  }
}

/// 一次分割的结果，持有二值平面，字形区域借用该平面
#[derive(Debug)]
pub struct Segmentation {
  plane: BinaryPlane,
  boxes: Vec<(usize, BoundingBox)>,
}

impl Segmentation {
  pub fn plane(&self) -> &BinaryPlane {
    &self.plane
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  /// 按左边缘升序排列的字形区域
  pub fn regions(&self) -> Vec<GlyphRegion<'_>> {
    self
      .boxes
      .iter()
      .map(|&(discovery, bbox)| GlyphRegion {
        bbox,
        discovery,
        source: &self.plane,
      })
      .collect()
  }
}

#[derive(Debug, Clone)]
pub struct Segmenter {
  min_extent: u32,
}

impl Default for Segmenter {
  fn default() -> Self {
    Self {
      min_extent: DEFAULT_MIN_EXTENT,
    }
  }
}

impl Segmenter {
  pub fn new(min_extent: u32) -> Self {
    Self { min_extent }
  }

  pub fn min_extent(&self) -> u32 {
    self.min_extent
  }

  /// 二值化快照，提取外轮廓，过滤过小的噪点，按左边缘排序。
  ///
  /// 失败时整个分割作废，不返回部分结果。
  pub fn segment(&self, frame: &RasterFrame) -> Result<Segmentation, SegmentationError> {
    if frame.is_empty() {
      return Err(SegmentationError::EmptyFrame {
        width: frame.width(),
        height: frame.height(),
      });
    }

    let plane = cv::binarize(&frame.to_luma());
    if (plane.width(), plane.height()) != (frame.width(), frame.height()) {
      return Err(SegmentationError::PlaneMismatch {
        frame: (frame.width(), frame.height()),
        plane: (plane.width(), plane.height()),
      });
    }

    let found = cv::find_outer_components(&plane);
    let total = found.len();
    let mut boxes: Vec<(usize, BoundingBox)> = found
      .into_iter()
      .enumerate()
      .filter(|(_, b)| b.width >= self.min_extent && b.height >= self.min_extent)
      .collect();
    // 稳定排序，左边缘相同时保持发现顺序
    boxes.sort_by_key(|(_, b)| b.x);

    debug!(
      "外轮廓 {} 个，过滤后保留 {} 个 (最小边长 {})",
      total,
      boxes.len(),
      self.min_extent
    );

    Ok(Segmentation { plane, boxes })
  }
}
