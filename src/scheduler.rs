// 该文件是 Huaban （画板） 项目的一部分。
// src/scheduler.rs - 空闲触发调度
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

use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
  Idle,
  Drawing,
  PendingTrigger { deadline: Instant },
}

/// 笔画停顿后触发一次推理的状态机。
///
/// 只有自上次触发以来确实留下了墨迹，笔画结束才会布置计时；
/// 计时期间任何新的笔画开始或采样都会取消它。
#[derive(Debug, Clone)]
pub struct DebounceScheduler {
  idle_window: Duration,
  state: SchedulerState,
  inked: bool,
}

impl DebounceScheduler {
  pub fn new(idle_window: Duration) -> Self {
    Self {
      idle_window,
      state: SchedulerState::Idle,
      inked: false,
    }
  }

  pub fn idle_window(&self) -> Duration {
    self.idle_window
  }

  pub fn state(&self) -> SchedulerState {
    self.state
  }

  pub fn deadline(&self) -> Option<Instant> {
    match self.state {
      SchedulerState::PendingTrigger { deadline } => Some(deadline),
      _ => None,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.deadline().is_some()
  }

  pub fn on_stroke_start(&mut self) {
    self.enter_drawing();
  }

  pub fn on_stroke_sample(&mut self) {
    self.enter_drawing();
    self.inked = true;
  }

  /// 返回是否布置了触发
  pub fn on_stroke_end(&mut self, now: Instant) -> bool {
    if !self.inked {
      self.state = SchedulerState::Idle;
      return false;
    }

    let deadline = now + self.idle_window;
    debug!("布置空闲触发，{:?} 后执行", self.idle_window);
    self.state = SchedulerState::PendingTrigger { deadline };
    true
  }

  /// 到期时触发恰好一次，并回到空闲
  pub fn poll(&mut self, now: Instant) -> bool {
    match self.state {
      SchedulerState::PendingTrigger { deadline } if now >= deadline => {
        self.state = SchedulerState::Idle;
        self.inked = false;
        true
      }
      _ => false,
    }
  }

  /// 上一轮执行期间布置的触发，从该轮结束时刻重新计时
  pub fn rearm(&mut self, now: Instant) {
    if self.is_pending() {
      self.state = SchedulerState::PendingTrigger {
        deadline: now + self.idle_window,
      };
    }
  }

  /// 画板被清空，丢弃待触发及墨迹标记
  pub fn reset(&mut self) {
    self.state = SchedulerState::Idle;
    self.inked = false;
  }

  /// 进入书写状态，同时丢弃尚未到期的触发
  fn enter_drawing(&mut self) {
    if self.is_pending() {
      debug!("新的笔画，取消待触发");
    }
    self.state = SchedulerState::Drawing;
  }
}
