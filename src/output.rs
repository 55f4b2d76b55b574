// 该文件是 Huaban （画板） 项目的一部分。
// src/output.rs - 识别结果输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::convert::Infallible;

use tracing::debug;

use crate::{dispatch::Prediction, surface::DrawingSurface};

pub trait Render<Surface: ?Sized, Output: ?Sized> {
  type Error;
  fn render_result(&self, surface: &mut Surface, result: &Output) -> Result<(), Self::Error>;
}

pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

/// 把识别结果写回画板：先擦除字形所在区域，再在原位写上标签。
///
/// 每个结果只覆盖自己的包围盒，重复渲染同一组结果得到相同的画面。
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultRenderer;

impl<S: DrawingSurface + ?Sized> Render<S, [Prediction]> for ResultRenderer {
  type Error = Infallible;

  fn render_result(&self, surface: &mut S, result: &[Prediction]) -> Result<(), Self::Error> {
    for prediction in result {
      debug!("渲染 '{}' 于 {:?}", prediction.label, prediction.bbox);
      surface.clear_region(&prediction.bbox);
      surface.draw_label(&prediction.bbox, &prediction.label.to_string());
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::{BoundingBox, Point},
    surface::Canvas,
  };

  fn prediction(x: u32, label: char) -> Prediction {
    Prediction {
      bbox: BoundingBox::new(x, 10, 30, 40),
      label,
      confidence: 0.9,
    }
  }

  fn scribble(canvas: &mut Canvas, x: f32) {
    canvas.begin_stroke(Point::new(x, 15.0));
    canvas.extend_stroke(Point::new(x + 20.0, 45.0));
    canvas.end_stroke();
  }

  #[test]
  fn glyph_ink_is_replaced_by_its_label() {
    let mut canvas = Canvas::new(120, 60).unwrap();
    scribble(&mut canvas, 10.0);
    scribble(&mut canvas, 70.0);

    ResultRenderer
      .render_result(&mut canvas, &[prediction(5, 'A')])
      .unwrap();

    // 第一个字形的墨迹被擦除，第二个保持不变
    let bbox = BoundingBox::new(5, 10, 30, 40);
    for (x, y, p) in canvas.ink().enumerate_pixels() {
      if bbox.contains(x, y) {
        assert_eq!(p.0, [255, 255, 255]);
      }
    }
    assert!(canvas.ink().pixels().any(|p| p.0 == [0, 0, 0]));
    assert!(canvas.annotations().pixels().any(|p| p[3] > 0));
  }

  #[test]
  fn rendering_twice_changes_nothing() {
    let mut canvas = Canvas::new(120, 60).unwrap();
    scribble(&mut canvas, 10.0);
    scribble(&mut canvas, 70.0);
    let result = [prediction(5, '7'), prediction(65, 'q')];

    ResultRenderer.render_result(&mut canvas, &result).unwrap();
    let once = canvas.composite();
    ResultRenderer.render_result(&mut canvas, &result).unwrap();
    assert_eq!(once, canvas.composite());
  }

  #[test]
  fn empty_result_leaves_surface_untouched() {
    let mut canvas = Canvas::new(60, 60).unwrap();
    scribble(&mut canvas, 10.0);
    let before = canvas.composite();
    ResultRenderer.render_result(&mut canvas, &[]).unwrap();
    assert_eq!(before, canvas.composite());
  }
}
