// 该文件是 Huaban （画板） 项目的一部分。
// src/output/save_image_file.rs - 保存画板图像
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  dispatch::Prediction,
  output::{Render, ResultRenderer},
  surface::Canvas,
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("路径解码错误: {0}")]
  PathError(String),
}

/// 把画板合成后的图像写入文件
pub struct SaveImageFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = urlencoding::decode(uri.path())
      .map_err(|e| SaveImageFileError::PathError(e.to_string()))?;
    Ok(Self {
      path: PathBuf::from(path.into_owned()),
    })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn save(&self, canvas: &Canvas) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    canvas
      .composite()
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}

impl Render<Canvas, [Prediction]> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, canvas: &mut Canvas, result: &[Prediction]) -> Result<(), Self::Error> {
    ResultRenderer
      .render_result(canvas, result)
      .unwrap_or_else(|never| match never {});
    self.save(canvas)
  }
}
