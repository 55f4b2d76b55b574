// 该文件是 Huaban （画板） 项目的一部分。
// src/input/stroke_script.rs - 笔画脚本回放
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

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
  sync::mpsc,
  time::{Instant, sleep_until},
};
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Point, task::StrokeEvent};

#[derive(Error, Debug)]
pub enum StrokeScriptError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("路径解码错误: {0}")]
  PathError(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("脚本解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("第 {index} 条事件的时间早于前一条")]
  OutOfOrder { index: usize },
  #[error("事件接收端已关闭")]
  Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeKind {
  Start,
  Sample,
  End,
  Clear,
}

/// 相对脚本开始时刻的一条指针事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedStroke {
  pub at_ms: u64,
  pub kind: StrokeKind,
  #[serde(default)]
  pub x: f32,
  #[serde(default)]
  pub y: f32,
}

impl TimedStroke {
  pub fn at(&self) -> Duration {
    Duration::from_millis(self.at_ms)
  }

  pub fn event(&self) -> StrokeEvent {
    let point = Point::new(self.x, self.y);
    match self.kind {
      StrokeKind::Start => StrokeEvent::Start(point),
      StrokeKind::Sample => StrokeEvent::Sample(point),
      StrokeKind::End => StrokeEvent::End,
      StrokeKind::Clear => StrokeEvent::Clear,
    }
  }
}

/// 按时间排列的笔画事件，用于无界面地重现一次书写过程
#[derive(Debug, Clone, Default)]
pub struct StrokeScript {
  strokes: Vec<TimedStroke>,
}

impl FromUrlWithScheme for StrokeScript {
  const SCHEME: &'static str = "strokes";
}

impl FromUrl for StrokeScript {
  type Error = StrokeScriptError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(StrokeScriptError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let path = super::decode_path(url).map_err(StrokeScriptError::PathError)?;
    let content = std::fs::read_to_string(&path)?;
    let script = Self::from_json(&content)?;
    info!(
      "读取笔画脚本 {}: {} 条事件",
      path.display(),
      script.len()
    );
    Ok(script)
  }
}

impl StrokeScript {
  pub fn new(strokes: Vec<TimedStroke>) -> Result<Self, StrokeScriptError> {
    if let Some(index) = strokes
      .windows(2)
      .position(|pair| pair[1].at_ms < pair[0].at_ms)
    {
      return Err(StrokeScriptError::OutOfOrder { index: index + 1 });
    }
    Ok(Self { strokes })
  }

  pub fn from_json(content: &str) -> Result<Self, StrokeScriptError> {
    Self::new(serde_json::from_str(content)?)
  }

  pub fn len(&self) -> usize {
    self.strokes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.strokes.is_empty()
  }

  pub fn strokes(&self) -> &[TimedStroke] {
    &self.strokes
  }

  /// 最后一条事件的时间
  pub fn duration(&self) -> Duration {
    self.strokes.last().map(TimedStroke::at).unwrap_or_default()
  }

  /// 按脚本时间把事件依次送出，返回送出的条数
  pub async fn replay(&self, events: &mpsc::Sender<StrokeEvent>) -> Result<usize, StrokeScriptError> {
    let origin = Instant::now();
    for stroke in &self.strokes {
      sleep_until(origin + stroke.at()).await;
      debug!("回放 {:?} @ {}ms", stroke.kind, stroke.at_ms);
      events
        .send(stroke.event())
        .await
        .map_err(|_| StrokeScriptError::Closed)?;
    }
    Ok(self.strokes.len())
  }
}
