// 该文件是 Huaban （画板） 项目的一部分。
// src/task.rs - 画板会话任务
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

use tokio::{
  sync::mpsc,
  time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
  dispatch::{GlyphWarning, Prediction},
  frame::Point,
  model::Classifier,
  output::{Render, ResultRenderer},
  pipeline::{Pipeline, PipelineError},
  scheduler::DebounceScheduler,
  surface::DrawingSurface,
};

/// 指针事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeEvent {
  Start(Point),
  Sample(Point),
  End,
  /// 清空画板，同时取消待触发的推理
  Clear,
}

/// 会话向外报告的状态
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
  /// 模型未就绪，本轮不执行。附带原因
  ModelUnavailable(String),
  RunStarted,
  RunCompleted {
    predictions: Vec<Prediction>,
    warnings: Vec<GlyphWarning>,
  },
  RunFailed(String),
}

/// 单线程画板会话：处理笔画、在停笔后触发推理、把结果写回画板。
///
/// 推理等待分类器期间，新到达的笔画事件照常处理。
pub struct Session<S, C> {
  surface: S,
  pipeline: Pipeline<C>,
  scheduler: DebounceScheduler,
  status: Option<mpsc::UnboundedSender<Status>>,
  loader: Option<ModelLoader<C>>,
}

/// 模型未就绪时在触发点重新加载
pub type ModelLoader<C> = Box<dyn FnMut() -> anyhow::Result<C>>;

impl<S: DrawingSurface, C: Classifier> Session<S, C> {
  pub fn new(surface: S, pipeline: Pipeline<C>) -> Self {
    let scheduler = DebounceScheduler::new(pipeline.config().idle_window);
    Self {
      surface,
      pipeline,
      scheduler,
      status: None,
      loader: None,
    }
  }

  pub fn with_loader(mut self, loader: impl FnMut() -> anyhow::Result<C> + 'static) -> Self {
    self.loader = Some(Box::new(loader));
    self
  }

  pub fn with_status(mut self, status: mpsc::UnboundedSender<Status>) -> Self {
    self.status = Some(status);
    self
  }

  pub fn surface(&self) -> &S {
    &self.surface
  }

  /// 运行会话直到事件流关闭，返回最终的画板。
  ///
  /// 事件流关闭时若仍有待触发的推理，等到期执行完后再退出。
  pub async fn run(self, mut events: mpsc::Receiver<StrokeEvent>) -> anyhow::Result<S> {
    let Session {
      mut surface,
      mut pipeline,
      mut scheduler,
      status,
      mut loader,
    } = self;
    let report = |s: Status| {
      if let Some(tx) = &status
        && tx.send(s).is_err()
      {
        debug!("状态接收端已关闭");
      }
    };

    info!("会话开始");
    let mut open = true;
    loop {
      let deadline = scheduler.deadline();
      if open {
        let wake = deadline.unwrap_or_else(Instant::now);
        tokio::select! {
          event = events.recv() => {
            match event {
              Some(event) => apply_event(&mut surface, &mut scheduler, event),
              None => {
                debug!("事件流关闭");
                open = false;
              }
            }
            continue;
          }
          _ = sleep_until(wake), if deadline.is_some() => {}
        }
      } else {
        match deadline {
          Some(deadline) => sleep_until(deadline).await,
          None => break,
        }
      }

      if !scheduler.poll(Instant::now()) {
        continue;
      }

      if !pipeline.model().is_ready()
        && let Some(loader) = loader.as_mut()
      {
        info!("模型未就绪，尝试重新加载");
        pipeline.model_mut().retry(|| loader());
      }
      if let Err(e) = pipeline.model().get() {
        warn!("{}，跳过本轮", e);
        report(Status::ModelUnavailable(e.0));
        continue;
      }

      info!("停笔超时，开始推理");
      report(Status::RunStarted);
      let frame = surface.current_frame();
      let run = pipeline.run(frame);
      tokio::pin!(run);

      let mut cleared = false;
      let outcome = loop {
        tokio::select! {
          outcome = &mut run => break outcome,
          event = events.recv(), if open => match event {
            Some(event) => {
              cleared |= event == StrokeEvent::Clear;
              apply_event(&mut surface, &mut scheduler, event);
            }
            None => open = false,
          },
        }
      };

      match outcome {
        Ok(result) => {
          if cleared {
            info!("推理期间画板已清空，丢弃本轮结果");
          } else {
            ResultRenderer
              .render_result(&mut surface, &result.predictions)
              .unwrap_or_else(|never| match never {});
          }
          report(Status::RunCompleted {
            predictions: result.predictions,
            warnings: result.warnings,
          });
        }
        Err(PipelineError::ModelUnavailable(e)) => {
          warn!("{}", e);
          report(Status::ModelUnavailable(e.0));
        }
        Err(e) => {
          warn!("推理失败: {}", e);
          report(Status::RunFailed(e.to_string()));
        }
      }

      scheduler.rearm(Instant::now());
    }

    info!("会话结束");
    Ok(surface)
  }
}

fn apply_event<S: DrawingSurface>(
  surface: &mut S,
  scheduler: &mut DebounceScheduler,
  event: StrokeEvent,
) {
  match event {
    StrokeEvent::Start(at) => {
      surface.begin_stroke(at);
      scheduler.on_stroke_start();
    }
    StrokeEvent::Sample(to) => {
      if surface.extend_stroke(to) {
        scheduler.on_stroke_sample();
      }
    }
    StrokeEvent::End => {
      surface.end_stroke();
      scheduler.on_stroke_end(Instant::now());
    }
    StrokeEvent::Clear => {
      surface.clear_all();
      scheduler.reset();
    }
  }
}
