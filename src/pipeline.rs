// 该文件是 Huaban （画板） 项目的一部分。
// src/pipeline.rs - 分割、归一化与分类流水线
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

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  dispatch::{Dispatcher, GlyphWarning, Prediction},
  frame::RasterFrame,
  model::{Alphabet, Classifier, ModelSlot, ModelUnavailable},
  normalize::GlyphNormalizer,
  segment::{DEFAULT_MIN_EXTENT, SegmentationError, Segmenter},
};

pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_millis(3000);

/// 流水线参数，默认值来自经验取值，可按需调整
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub min_extent: u32,
  pub idle_window: Duration,
  pub alphabet: Alphabet,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      min_extent: DEFAULT_MIN_EXTENT,
      idle_window: DEFAULT_IDLE_WINDOW,
      alphabet: Alphabet::default(),
    }
  }
}

impl PipelineConfig {
  pub fn with_min_extent(mut self, min_extent: u32) -> Self {
    self.min_extent = min_extent;
    self
  }

  pub fn with_idle_window(mut self, idle_window: Duration) -> Self {
    self.idle_window = idle_window;
    self
  }

  pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
    self.alphabet = alphabet;
    self
  }
}

/// 整轮失败，画板不做任何修改
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  ModelUnavailable(#[from] ModelUnavailable),
  #[error("分割失败: {0}")]
  Segmentation(#[from] SegmentationError),
}

/// 一轮推理的结果
#[derive(Debug, Clone, Default)]
pub struct RunReport {
  /// 通过尺寸过滤的字形数
  pub regions: usize,
  /// 按从左到右排列
  pub predictions: Vec<Prediction>,
  pub warnings: Vec<GlyphWarning>,
  pub elapsed: Duration,
}

pub struct Pipeline<C> {
  config: PipelineConfig,
  segmenter: Segmenter,
  dispatcher: Dispatcher,
  model: ModelSlot<C>,
}

impl<C: Classifier> Pipeline<C> {
  pub fn new(config: PipelineConfig, model: ModelSlot<C>) -> Self {
    Self {
      segmenter: Segmenter::new(config.min_extent),
      dispatcher: Dispatcher::default(),
      config,
      model,
    }
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn model(&self) -> &ModelSlot<C> {
    &self.model
  }

  pub fn model_mut(&mut self) -> &mut ModelSlot<C> {
    &mut self.model
  }

  pub fn dispatcher(&self) -> &Dispatcher {
    &self.dispatcher
  }

  /// 执行一轮：分割快照，逐个归一化，调用分类器。
  ///
  /// 模型未就绪或分割失败时整轮放弃；单个字形的失败只记录警告。
  pub async fn run(&self, frame: RasterFrame) -> Result<RunReport, PipelineError> {
    let classifier = self.model.get()?;
    let started = Instant::now();

    let segmentation = self.segmenter.segment(&frame)?;
    drop(frame);
    info!("分割出 {} 个字形", segmentation.len());

    let normalizer = GlyphNormalizer::new(classifier.input_shape());
    let mut warnings = Vec::new();
    let mut batch = Vec::with_capacity(segmentation.len());
    for region in segmentation.regions() {
      match normalizer.normalize(&region) {
        Ok(sample) => batch.push((region, sample)),
        Err(source) => {
          let warning = GlyphWarning::Normalization {
            bbox: region.bbox,
            source,
          };
          warn!("跳过字形: {}", warning);
          warnings.push(warning);
        }
      }
    }
    debug!("{} 个样本送入分类器", batch.len());

    let dispatched = self
      .dispatcher
      .classify(classifier, &self.config.alphabet, batch)
      .await;
    warnings.extend(dispatched.warnings);

    let report = RunReport {
      regions: segmentation.len(),
      predictions: dispatched.predictions,
      warnings,
      elapsed: started.elapsed(),
    };
    info!(
      "推理完成，识别 {} 个，跳过 {} 个，耗时: {:.2?}",
      report.predictions.len(),
      report.warnings.len(),
      report.elapsed
    );
    Ok(report)
  }
}
