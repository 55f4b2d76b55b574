// 该文件是 Huaban （画板） 项目的一部分。
// src/bin/replay.rs - 回放笔画脚本
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use tokio::sync::{Notify, mpsc};
use tracing::{info, warn};
use url::Url;

use huaban::{
  FromUrl,
  input::StrokeScript,
  model::{DenseClassifierBuilder, ModelSlot},
  output::SaveImageFileOutput,
  pipeline::{Pipeline, PipelineConfig},
  segment::DEFAULT_MIN_EXTENT,
  surface::Canvas,
  task::{Session, Status},
};

/// Huaban 笔画回放参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类模型，例如 dense:///path/model.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 笔画脚本，例如 strokes:///path/script.json
  #[arg(long, value_name = "SCRIPT")]
  pub script: Url,
  /// 回放结束后的画板图像，例如 image:///path/out.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 画板宽度
  #[arg(long, default_value = "800", value_name = "PIXELS")]
  pub width: u32,
  /// 画板高度
  #[arg(long, default_value = "600", value_name = "PIXELS")]
  pub height: u32,
  /// 字形包围盒的最小宽高（像素）
  #[arg(long, default_value_t = DEFAULT_MIN_EXTENT, value_name = "PIXELS")]
  pub min_extent: u32,
  /// 停笔多久后开始推理（毫秒）
  #[arg(long, default_value = "3000", value_name = "MILLIS")]
  pub idle_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("笔画脚本: {}", args.script);
  info!("输出路径: {}", args.output);

  let script = StrokeScript::from_url(&args.script)?;
  let builder = DenseClassifierBuilder::from_url(&args.model)?;
  let model = ModelSlot::load(|| builder.build());
  let output = SaveImageFileOutput::from_url(&args.output)?;

  let config = PipelineConfig::default()
    .with_min_extent(args.min_extent)
    .with_idle_window(Duration::from_millis(args.idle_ms));
  let pipeline = Pipeline::new(config, model);
  let canvas = Canvas::new(args.width, args.height)?;

  let (status_tx, mut status_rx) = mpsc::unbounded_channel();
  let (event_tx, event_rx) = mpsc::channel(64);
  let model_url = args.model.clone();
  let session = Session::new(canvas, pipeline)
    .with_status(status_tx)
    .with_loader(move || Ok(DenseClassifierBuilder::from_url(&model_url)?.build()?));

  let stop = Arc::new(Notify::new());
  {
    let stop = stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      stop.notify_one();
    })?;
  }

  // 回放结束或被中断后关闭事件流，会话处理完待触发的推理再退出
  let feed = async move {
    tokio::select! {
      result = script.replay(&event_tx) => match result {
        Ok(count) => info!("回放完成，共 {} 条事件", count),
        Err(e) => warn!("回放中止: {}", e),
      },
      _ = stop.notified() => warn!("中断信号接收，停止回放"),
    }
  };

  let statuses = async move {
    while let Some(status) = status_rx.recv().await {
      match status {
        Status::RunStarted => info!("开始推理..."),
        Status::RunCompleted {
          predictions,
          warnings,
        } => {
          let text: String = predictions.iter().map(|p| p.label).collect();
          info!("识别结果: \"{}\"，跳过 {} 个字形", text, warnings.len());
        }
        Status::ModelUnavailable(reason) => warn!("模型不可用: {}", reason),
        Status::RunFailed(reason) => warn!("推理失败: {}", reason),
      }
    }
  };

  let (canvas, (), ()) = tokio::join!(session.run(event_rx), feed, statuses);
  output.save(&canvas?)?;

  Ok(())
}
