// 该文件是 Huaban （画板） 项目的一部分。
// src/model.rs - 字符分类模型
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

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tracing::{error, info};

use crate::normalize::{NormalizedSample, SampleShape};

/// EMNIST byclass 的 62 个字符，按模型输出下标排列
pub const EMNIST_BYCLASS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
pub const UNKNOWN_LABEL: char = '?';

/// 单样本字符分类器：固定形状输入，输出固定字母表上的概率分布
pub trait Classifier {
  type Error: Display;

  fn input_shape(&self) -> SampleShape;

  /// 将概率分布写入 `scores`（调用前已清空）
  fn infer(
    &self,
    sample: &NormalizedSample,
    scores: &mut Vec<f32>,
  ) -> impl Future<Output = Result<(), Self::Error>>;

  /// 模型自带的标签表，没有时使用流水线配置的字母表
  fn labels(&self) -> Option<&Alphabet> {
    None
  }
}

/// 分类器输出下标到显示字符的有序映射
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
  symbols: Box<[char]>,
}

impl Default for Alphabet {
  fn default() -> Self {
    Self::new(EMNIST_BYCLASS)
  }
}

impl Alphabet {
  pub fn new(symbols: &str) -> Self {
    Self {
      symbols: symbols.chars().collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  /// 越界下标返回 [`UNKNOWN_LABEL`]
  pub fn label(&self, index: usize) -> char {
    self.symbols.get(index).copied().unwrap_or(UNKNOWN_LABEL)
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("模型不可用: {0}")]
pub struct ModelUnavailable(pub String);

#[derive(Debug)]
pub enum ModelState<C> {
  Loading,
  Ready(C),
  Failed(String),
}

/// 模型加载状态。未就绪时流水线拒绝启动。
#[derive(Debug)]
pub struct ModelSlot<C> {
  state: ModelState<C>,
}

impl<C> Default for ModelSlot<C> {
  fn default() -> Self {
    Self::loading()
  }
}

impl<C> ModelSlot<C> {
  pub fn loading() -> Self {
    Self {
      state: ModelState::Loading,
    }
  }

  pub fn ready(model: C) -> Self {
    Self {
      state: ModelState::Ready(model),
    }
  }

  pub fn load<E: Display>(loader: impl FnOnce() -> Result<C, E>) -> Self {
    let mut slot = Self::loading();
    slot.retry(loader);
    slot
  }

  /// 重新加载，已就绪时不做任何事。返回是否就绪。
  pub fn retry<E: Display>(&mut self, loader: impl FnOnce() -> Result<C, E>) -> bool {
    if self.is_ready() {
      return true;
    }

    self.state = ModelState::Loading;
    match loader() {
      Ok(model) => {
        info!("模型加载完成");
        self.state = ModelState::Ready(model);
        true
      }
      Err(e) => {
        error!("模型加载失败: {}", e);
        self.state = ModelState::Failed(e.to_string());
        false
      }
    }
  }

  pub fn state(&self) -> &ModelState<C> {
    &self.state
  }

  pub fn is_ready(&self) -> bool {
    matches!(self.state, ModelState::Ready(_))
  }

  pub fn get(&self) -> Result<&C, ModelUnavailable> {
    match &self.state {
      ModelState::Ready(model) => Ok(model),
      ModelState::Loading => Err(ModelUnavailable("模型仍在加载".to_string())),
      ModelState::Failed(reason) => Err(ModelUnavailable(reason.clone())),
    }
  }
}

#[cfg(feature = "model_dense")]
mod dense;
#[cfg(feature = "model_dense")]
pub use self::dense::{DenseClassifier, DenseClassifierBuilder, DenseClassifierError};
