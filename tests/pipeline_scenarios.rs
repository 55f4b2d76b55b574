// 该文件是 Huaban （画板） 项目的一部分。
// tests/pipeline_scenarios.rs - 端到端场景
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

use std::{cell::Cell, time::Duration};

use huaban::{
  dispatch::Prediction,
  frame::{BoundingBox, Point},
  model::{Classifier, ModelSlot},
  normalize::{NormalizedSample, SampleShape},
  pipeline::{Pipeline, PipelineConfig},
  surface::Canvas,
  task::{Session, Status, StrokeEvent},
};
use image::{Rgb, RgbImage};
use tokio::sync::mpsc;

const WHITE: [u8; 3] = [255, 255, 255];
const BLACK: [u8; 3] = [0, 0, 0];

/// 按调用顺序给出下标，`None` 表示该次调用失败
struct Scripted {
  replies: Vec<Option<usize>>,
  calls: Cell<usize>,
}

impl Scripted {
  fn new(replies: Vec<Option<usize>>) -> Self {
    Self {
      replies,
      calls: Cell::new(0),
    }
  }
}

impl Classifier for Scripted {
  type Error = String;

  fn input_shape(&self) -> SampleShape {
    SampleShape::default()
  }

  async fn infer(&self, sample: &NormalizedSample, scores: &mut Vec<f32>) -> Result<(), String> {
    let call = self.calls.get();
    self.calls.set(call + 1);
    assert_eq!(sample.shape(), SampleShape::new(28, 28, 1));
    assert!(sample.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));

    tokio::time::sleep(Duration::from_millis(5)).await;
    match self.replies.get(call).copied().flatten() {
      Some(index) => {
        scores.resize(62, 0.0);
        scores[index] = 1.0;
        Ok(())
      }
      None => Err(format!("第 {} 次调用失败", call)),
    }
  }
}

fn ms(n: u64) -> Duration {
  Duration::from_millis(n)
}

/// 一笔斜线，圆头半径 8，包围盒左上角为 `from - 8`
async fn stroke(tx: &mpsc::Sender<StrokeEvent>, from: (f32, f32), to: (f32, f32)) {
  tx.send(StrokeEvent::Start(Point::new(from.0, from.1)))
    .await
    .unwrap();
  let mid = ((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0);
  for (x, y) in [from, mid, to] {
    tx.send(StrokeEvent::Sample(Point::new(x, y))).await.unwrap();
  }
  tx.send(StrokeEvent::End).await.unwrap();
}

async fn run_session(
  canvas: Canvas,
  classifier: Scripted,
  script: impl AsyncFnOnce(&mpsc::Sender<StrokeEvent>),
) -> (Canvas, Vec<Status>) {
  let (status_tx, mut status_rx) = mpsc::unbounded_channel();
  let (tx, rx) = mpsc::channel(64);
  let pipeline = Pipeline::new(PipelineConfig::default(), ModelSlot::ready(classifier));
  let session = Session::new(canvas, pipeline).with_status(status_tx);

  let driver = async move {
    script(&tx).await;
  };
  let (canvas, ()) = tokio::join!(session.run(rx), driver);

  let mut statuses = Vec::new();
  while let Ok(status) = status_rx.try_recv() {
    statuses.push(status);
  }
  (canvas.unwrap(), statuses)
}

fn completed(statuses: &[Status]) -> Vec<(Vec<Prediction>, usize)> {
  statuses
    .iter()
    .filter_map(|s| match s {
      Status::RunCompleted {
        predictions,
        warnings,
      } => Some((predictions.clone(), warnings.len())),
      _ => None,
    })
    .collect()
}

fn coverage_center(canvas: &Canvas) -> (f32, f32) {
  let (mut sx, mut sy, mut n) = (0.0, 0.0, 0.0);
  for (x, y, p) in canvas.annotations().enumerate_pixels() {
    if p[3] > 127 {
      sx += x as f32;
      sy += y as f32;
      n += 1.0;
    }
  }
  assert!(n > 0.0, "没有绘制任何标签");
  (sx / n, sy / n)
}

#[tokio::test(start_paused = true)]
async fn single_glyph_is_labelled_in_place() {
  let canvas = Canvas::new(200, 120).unwrap();
  let (canvas, statuses) = run_session(canvas, Scripted::new(vec![Some(1)]), async |tx| {
    stroke(tx, (18.0, 18.0), (41.0, 61.0)).await;
  })
  .await;

  let runs = completed(&statuses);
  assert_eq!(runs.len(), 1);
  let (predictions, warnings) = &runs[0];
  assert_eq!(*warnings, 0);
  assert_eq!(predictions.len(), 1);
  assert_eq!(predictions[0].label, '1');

  let bbox = predictions[0].bbox;
  assert!((bbox.x as i32 - 10).abs() <= 1 && (bbox.y as i32 - 10).abs() <= 1);
  assert!((bbox.width as i32 - 40).abs() <= 1 && (bbox.height as i32 - 60).abs() <= 1);

  assert!(canvas.ink().pixels().all(|p| p.0 == WHITE));
  let (cx, cy) = coverage_center(&canvas);
  let (bx, by) = bbox.center();
  assert!((cx - bx).abs() <= 6.0, "水平中心 {} / {}", cx, bx);
  assert!((cy - by).abs() <= 6.0, "垂直中心 {} / {}", cy, by);
  for (x, y, p) in canvas.annotations().enumerate_pixels() {
    if p[3] > 0 {
      assert!(bbox.contains(x, y));
    }
  }
}

#[tokio::test(start_paused = true)]
async fn glyphs_are_labelled_left_to_right_whatever_the_drawing_order() {
  let canvas = Canvas::new(200, 120).unwrap();
  let classifier = Scripted::new(vec![Some(10), Some(11)]);
  let (_, statuses) = run_session(canvas, classifier, async |tx| {
    // 先画右边，再画左边
    stroke(tx, (108.0, 20.0), (133.0, 60.0)).await;
    tokio::time::sleep(ms(500)).await;
    stroke(tx, (18.0, 20.0), (43.0, 60.0)).await;
  })
  .await;

  let runs = completed(&statuses);
  assert_eq!(runs.len(), 1);
  let predictions = &runs[0].0;
  let order: Vec<(u32, char)> = predictions.iter().map(|p| (p.bbox.x, p.label)).collect();
  assert_eq!(order, vec![(10, 'A'), (100, 'B')]);
}

#[tokio::test(start_paused = true)]
async fn undersized_ink_is_never_classified() {
  let mut image = RgbImage::from_pixel(200, 120, Rgb(WHITE));
  for y in 20..80 {
    for x in 150..155 {
      image.put_pixel(x, y, Rgb(BLACK));
    }
  }
  let canvas = Canvas::from_image(image).unwrap();

  let (canvas, statuses) = run_session(canvas, Scripted::new(vec![]), async |tx| {
    // 原地点一下：留下一个直径 17 的圆点，同样小于阈值
    tx.send(StrokeEvent::Start(Point::new(40.0, 40.0)))
      .await
      .unwrap();
    tx.send(StrokeEvent::Sample(Point::new(40.0, 40.0)))
      .await
      .unwrap();
    tx.send(StrokeEvent::End).await.unwrap();
  })
  .await;

  let runs = completed(&statuses);
  assert_eq!(runs.len(), 1);
  assert!(runs[0].0.is_empty());
  assert_eq!(runs[0].1, 0);
  assert_eq!(canvas.ink().get_pixel(152, 50).0, BLACK);
  assert_eq!(canvas.ink().get_pixel(40, 40).0, BLACK);
  assert!(canvas.annotations().pixels().all(|p| p[3] == 0));
}

#[tokio::test(start_paused = true)]
async fn a_failed_glyph_keeps_its_ink() {
  let canvas = Canvas::new(240, 120).unwrap();
  let classifier = Scripted::new(vec![Some(1), None, Some(3)]);
  let (canvas, statuses) = run_session(canvas, classifier, async |tx| {
    stroke(tx, (18.0, 20.0), (43.0, 60.0)).await;
    stroke(tx, (98.0, 20.0), (123.0, 60.0)).await;
    stroke(tx, (178.0, 20.0), (203.0, 60.0)).await;
  })
  .await;

  let runs = completed(&statuses);
  assert_eq!(runs.len(), 1);
  let (predictions, warnings) = &runs[0];
  assert_eq!(*warnings, 1);
  let labels: String = predictions.iter().map(|p| p.label).collect();
  assert_eq!(labels, "13");

  // 中间的字形没有被擦除
  assert_eq!(canvas.ink().get_pixel(110, 40).0, BLACK);
  assert_eq!(canvas.ink().get_pixel(30, 40).0, WHITE);
  assert_eq!(canvas.ink().get_pixel(190, 40).0, WHITE);
  let middle = BoundingBox::new(85, 5, 50, 70);
  for (x, y, p) in canvas.annotations().enumerate_pixels() {
    if middle.contains(x, y) {
      assert_eq!(p[3], 0);
    }
  }
}

#[tokio::test(start_paused = true)]
async fn continued_drawing_postpones_the_run() {
  let canvas = Canvas::new(240, 120).unwrap();
  let classifier = Scripted::new(vec![Some(5), Some(6)]);
  let (_, statuses) = run_session(canvas, classifier, async |tx| {
    stroke(tx, (18.0, 20.0), (43.0, 60.0)).await;
    tokio::time::sleep(ms(2900)).await;
    stroke(tx, (98.0, 20.0), (123.0, 60.0)).await;
    tokio::time::sleep(ms(2900)).await;
  })
  .await;

  // 两次停顿都短于空闲窗口，只在最后一笔之后推理一次
  let runs = completed(&statuses);
  assert_eq!(runs.len(), 1);
  assert_eq!(runs[0].0.len(), 2);
  assert_eq!(
    statuses
      .iter()
      .filter(|s| matches!(s, Status::RunStarted))
      .count(),
    1
  );
}
