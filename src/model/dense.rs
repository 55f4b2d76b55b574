// 该文件是 Huaban （画板） 项目的一部分。
// src/model/dense.rs - 单层 softmax 分类器
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Alphabet, Classifier},
  normalize::{NormalizedSample, SampleShape},
};

#[derive(Error, Debug)]
pub enum DenseClassifierError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型解析错误: {0}")]
  ModelParseError(#[from] serde_json::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("输入形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: SampleShape,
    actual: SampleShape,
  },
}

#[derive(Debug, Deserialize)]
struct ArtifactShape {
  width: u32,
  height: u32,
  #[serde(default = "default_channels")]
  channels: u32,
}

fn default_channels() -> u32 {
  1
}

/// 模型文件格式
#[derive(Debug, Deserialize)]
struct DenseArtifact {
  input: ArtifactShape,
  weights: Vec<Vec<f32>>,
  bias: Vec<f32>,
  #[serde(default)]
  labels: Option<String>,
}

/// 全连接层 + softmax：`scores = softmax(W · x + b)`
#[derive(Debug, Clone)]
pub struct DenseClassifier {
  shape: SampleShape,
  classes: usize,
  weights: Box<[f32]>,
  bias: Box<[f32]>,
  labels: Option<Alphabet>,
}

pub struct DenseClassifierBuilder {
  model_path: String,
}

impl FromUrlWithScheme for DenseClassifierBuilder {
  const SCHEME: &'static str = "dense";
}

impl FromUrl for DenseClassifierBuilder {
  type Error = DenseClassifierError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DenseClassifierError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let model_path = urlencoding::decode(url.path())
      .map_err(|e| DenseClassifierError::ModelPathError(e.to_string()))?
      .into_owned();
    Ok(DenseClassifierBuilder { model_path })
  }
}

impl DenseClassifierBuilder {
  pub fn build(self) -> Result<DenseClassifier, DenseClassifierError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let artifact: DenseArtifact = serde_json::from_slice(&model_data)?;
    DenseClassifier::from_artifact(artifact)
  }
}

impl DenseClassifier {
  pub fn from_json(json: &str) -> Result<Self, DenseClassifierError> {
    let artifact: DenseArtifact = serde_json::from_str(json)?;
    Self::from_artifact(artifact)
  }

  fn from_artifact(artifact: DenseArtifact) -> Result<Self, DenseClassifierError> {
    let shape = SampleShape::new(
      artifact.input.width,
      artifact.input.height,
      artifact.input.channels,
    );
    if shape.is_empty() {
      return Err(DenseClassifierError::ModelInvalid(format!(
        "输入形状为空: {:?}",
        shape
      )));
    }

    let classes = artifact.weights.len();
    if classes == 0 || artifact.bias.len() != classes {
      error!(
        "权重行数 {} 与偏置长度 {} 不一致",
        classes,
        artifact.bias.len()
      );
      return Err(DenseClassifierError::ModelInvalid(format!(
        "权重行数 {} 与偏置长度 {} 不一致",
        classes,
        artifact.bias.len()
      )));
    }

    let mut weights = Vec::with_capacity(classes * shape.len());
    for (i, row) in artifact.weights.into_iter().enumerate() {
      if row.len() != shape.len() {
        return Err(DenseClassifierError::ModelInvalid(format!(
          "第 {} 行权重长度为 {}, 期望 {}",
          i,
          row.len(),
          shape.len()
        )));
      }
      weights.extend(row);
    }

    let labels = artifact.labels.as_deref().map(Alphabet::new);
    if let Some(labels) = &labels
      && labels.len() != classes
    {
      return Err(DenseClassifierError::ModelInvalid(format!(
        "标签数 {} 与类别数 {} 不一致",
        labels.len(),
        classes
      )));
    }

    debug!("模型输入形状: {:?}", shape);
    debug!("模型类别数量: {}", classes);

    Ok(DenseClassifier {
      shape,
      classes,
      weights: weights.into_boxed_slice(),
      bias: artifact.bias.into_boxed_slice(),
      labels,
    })
  }

  pub fn classes(&self) -> usize {
    self.classes
  }
}

impl Classifier for DenseClassifier {
  type Error = DenseClassifierError;

  fn input_shape(&self) -> SampleShape {
    self.shape
  }

  async fn infer(&self, sample: &NormalizedSample, scores: &mut Vec<f32>) -> Result<(), Self::Error> {
    if sample.shape() != self.shape {
      return Err(DenseClassifierError::ShapeMismatch {
        expected: self.shape,
        actual: sample.shape(),
      });
    }

    // 让出一次，绘制事件可以在推理间隙得到处理
    tokio::task::yield_now().await;

    let input = sample.as_slice();
    let features = self.shape.len();
    scores.extend(
      self
        .weights
        .chunks_exact(features)
        .zip(self.bias.iter())
        .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b),
    );
    softmax(scores);

    Ok(())
  }

  fn labels(&self) -> Option<&Alphabet> {
    self.labels.as_ref()
  }
}

fn softmax(logits: &mut [f32]) {
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let mut sum = 0.0;
  for v in logits.iter_mut() {
    *v = (*v - max).exp();
    sum += *v;
  }
  if sum > 0.0 {
    for v in logits.iter_mut() {
      *v /= sum;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::normalize::GlyphNormalizer;
  use image::{GrayImage, Luma};
  use std::io::Write;

  // 2x2 输入，三类：左列亮、右列亮、全暗
  const TINY_MODEL: &str = r#"{
    "input": { "width": 2, "height": 2 },
    "weights": [
      [4.0, -4.0, 4.0, -4.0],
      [-4.0, 4.0, -4.0, 4.0],
      [-2.0, -2.0, -2.0, -2.0]
    ],
    "bias": [0.0, 0.0, 1.0],
    "labels": "LR_"
  }"#;

  fn sample(left: u8, right: u8) -> NormalizedSample {
    let mut crop = GrayImage::new(2, 2);
    for y in 0..2 {
      crop.put_pixel(0, y, Luma([left]));
      crop.put_pixel(1, y, Luma([right]));
    }
    GlyphNormalizer::new(SampleShape::new(2, 2, 1))
      .normalize_pixels(&crop)
      .unwrap()
  }

  #[tokio::test]
  async fn infers_a_probability_distribution() {
    let model = DenseClassifier::from_json(TINY_MODEL).unwrap();
    assert_eq!(model.classes(), 3);
    assert_eq!(model.labels().map(|l| l.label(1)), Some('R'));

    let mut scores = Vec::new();
    model.infer(&sample(0, 255), &mut scores).await.unwrap();
    assert_eq!(scores.len(), 3);
    assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    assert!(scores[1] > scores[0] && scores[1] > scores[2]);
  }

  #[tokio::test]
  async fn rejects_samples_of_the_wrong_shape() {
    let model = DenseClassifier::from_json(TINY_MODEL).unwrap();
    let wrong = GlyphNormalizer::default()
      .normalize_pixels(&GrayImage::new(4, 4))
      .unwrap();
    let mut scores = Vec::new();
    assert!(matches!(
      model.infer(&wrong, &mut scores).await,
      Err(DenseClassifierError::ShapeMismatch { .. })
    ));
  }

  #[test]
  fn rejects_inconsistent_artifacts() {
    let bad_row = r#"{ "input": { "width": 2, "height": 2 }, "weights": [[1.0]], "bias": [0.0] }"#;
    assert!(matches!(
      DenseClassifier::from_json(bad_row),
      Err(DenseClassifierError::ModelInvalid(_))
    ));

    let bad_bias =
      r#"{ "input": { "width": 1, "height": 1 }, "weights": [[1.0], [2.0]], "bias": [0.0] }"#;
    assert!(matches!(
      DenseClassifier::from_json(bad_bias),
      Err(DenseClassifierError::ModelInvalid(_))
    ));

    assert!(matches!(
      DenseClassifier::from_json("not json"),
      Err(DenseClassifierError::ModelParseError(_))
    ));
  }

  #[test]
  fn builds_from_dense_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    std::fs::File::create(&path)
      .unwrap()
      .write_all(TINY_MODEL.as_bytes())
      .unwrap();

    let url = Url::parse(&format!("dense://{}", path.display())).unwrap();
    let model = DenseClassifierBuilder::from_url(&url)
      .unwrap()
      .build()
      .unwrap();
    assert_eq!(model.input_shape(), SampleShape::new(2, 2, 1));

    let wrong_scheme = Url::parse(&format!("file://{}", path.display())).unwrap();
    assert!(matches!(
      DenseClassifierBuilder::from_url(&wrong_scheme),
      Err(DenseClassifierError::ModelPathError(_))
    ));
  }

  #[test]
  fn missing_file_is_a_load_error() {
    let url = Url::parse("dense:///nonexistent/huaban/model.json").unwrap();
    assert!(matches!(
      DenseClassifierBuilder::from_url(&url).unwrap().build(),
      Err(DenseClassifierError::ModelLoadError(_))
    ));
  }
}
