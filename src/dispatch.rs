// 该文件是 Huaban （画板） 项目的一部分。
// src/dispatch.rs - 分类调度
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

use std::cell::{Cell, RefCell};
use std::ops::{Deref, DerefMut};

use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  frame::BoundingBox,
  model::{Alphabet, Classifier},
  normalize::{NormalizationError, NormalizedSample},
  segment::GlyphRegion,
};

/// 一个字形的识别结果。只保留包围盒，渲染时不再需要快照像素。
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
  pub bbox: BoundingBox,
  pub label: char,
  pub confidence: f32,
}

/// 单个字形被跳过的原因，不影响同一轮中的其他字形
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlyphWarning {
  #[error("字形 {bbox:?} 归一化失败: {source}")]
  Normalization {
    bbox: BoundingBox,
    #[source]
    source: NormalizationError,
  },
  #[error("字形 {bbox:?} 分类失败: {message}")]
  Classifier { bbox: BoundingBox, message: String },
}

impl GlyphWarning {
  pub fn bbox(&self) -> BoundingBox {
    match self {
      GlyphWarning::Normalization { bbox, .. } | GlyphWarning::Classifier { bbox, .. } => *bbox,
    }
  }
}

/// 推理输出缓冲池。每次租借在作用域结束时归还，出错路径也一样。
#[derive(Debug, Default)]
pub struct ScratchPool {
  free: RefCell<Vec<Vec<f32>>>,
  leased: Cell<usize>,
}

impl ScratchPool {
  pub fn lease(&self) -> ScratchLease<'_> {
    let mut buffer = self.free.borrow_mut().pop().unwrap_or_default();
    buffer.clear();
    self.leased.set(self.leased.get() + 1);
    ScratchLease { pool: self, buffer }
  }

  /// 尚未归还的缓冲区数量
  pub fn outstanding(&self) -> usize {
    self.leased.get()
  }

  pub fn pooled(&self) -> usize {
    self.free.borrow().len()
  }
}

pub struct ScratchLease<'a> {
  pool: &'a ScratchPool,
  buffer: Vec<f32>,
}

impl Deref for ScratchLease<'_> {
  type Target = Vec<f32>;

  fn deref(&self) -> &Self::Target {
    &self.buffer
  }
}

impl DerefMut for ScratchLease<'_> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.buffer
  }
}

impl Drop for ScratchLease<'_> {
  fn drop(&mut self) {
    let mut buffer = std::mem::take(&mut self.buffer);
    buffer.clear();
    self.pool.free.borrow_mut().push(buffer);
    self.pool.leased.set(self.pool.leased.get() - 1);
  }
}

/// 分类调度的输出，预测结果保持输入的从左到右顺序
#[derive(Debug, Default)]
pub struct Dispatched {
  pub predictions: Vec<Prediction>,
  pub warnings: Vec<GlyphWarning>,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
  scratch: ScratchPool,
}

impl Dispatcher {
  pub fn scratch(&self) -> &ScratchPool {
    &self.scratch
  }

  /// 对每个样本调用分类器并取最大概率的下标作为标签。
  ///
  /// 各调用并发等待，结果按提交顺序重新排列，与完成顺序无关。
  pub async fn classify<C: Classifier>(
    &self,
    classifier: &C,
    alphabet: &Alphabet,
    batch: Vec<(GlyphRegion<'_>, NormalizedSample)>,
  ) -> Dispatched {
    let alphabet = classifier.labels().unwrap_or(alphabet);
    let calls = batch.into_iter().map(|(region, sample)| {
      let bbox = region.bbox;
      async move {
        let mut scores = self.scratch.lease();
        let result = classifier.infer(&sample, &mut scores).await;
        drop(sample);
        match result {
          Ok(()) => match argmax(&scores) {
            Some((index, confidence)) => {
              let label = alphabet.label(index);
              debug!(
                "字形 {:?}: 下标 {} -> '{}' ({:.2}%)",
                bbox,
                index,
                label,
                confidence * 100.0
              );
              Ok(Prediction {
                bbox,
                label,
                confidence,
              })
            }
            None => Err(GlyphWarning::Classifier {
              bbox,
              message: "分类器返回空的概率分布".to_string(),
            }),
          },
          Err(e) => Err(GlyphWarning::Classifier {
            bbox,
            message: e.to_string(),
          }),
        }
      }
    });

    let mut dispatched = Dispatched::default();
    for outcome in join_all(calls).await {
      match outcome {
        Ok(prediction) => dispatched.predictions.push(prediction),
        Err(warning) => {
          warn!("{}", warning);
          dispatched.warnings.push(warning);
        }
      }
    }
    dispatched
  }
}

/// 最大概率的下标及其概率，忽略 NaN
fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
  scores
    .iter()
    .copied()
    .enumerate()
    .filter(|(_, v)| !v.is_nan())
    .fold(None, |best, (i, v)| match best {
      Some((_, bv)) if bv >= v => best,
      _ => Some((i, v)),
    })
}
