// 该文件是 Huaban （画板） 项目的一部分。
// src/bin/oneshot.rs - 识别一张图像中的手写字符
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use huaban::{
  FromUrl,
  input::ImageFileInput,
  model::{DenseClassifierBuilder, ModelSlot},
  output::{Render, SaveImageFileOutput},
  pipeline::{Pipeline, PipelineConfig},
  segment::DEFAULT_MIN_EXTENT,
  surface::DrawingSurface,
};

/// Huaban 单次识别参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类模型，例如 dense:///path/model.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///path/board.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出图像，例如 image:///path/out.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 字形包围盒的最小宽高（像素）
  #[arg(long, default_value_t = DEFAULT_MIN_EXTENT, value_name = "PIXELS")]
  pub min_extent: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let builder = DenseClassifierBuilder::from_url(&args.model)?;
  let model = ModelSlot::load(|| builder.build());
  let output = SaveImageFileOutput::from_url(&args.output)?;

  let config = PipelineConfig::default().with_min_extent(args.min_extent);
  let pipeline = Pipeline::new(config, model);
  let mut canvas = input.into_canvas()?;

  info!("开始推理...");
  let report = pipeline.run(canvas.current_frame()).await?;
  let text: String = report.predictions.iter().map(|p| p.label).collect();
  info!("识别结果: \"{}\"", text);

  output.render_result(&mut canvas, &report.predictions)?;
  println!("{}", text);

  Ok(())
}
