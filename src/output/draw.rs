// 该文件是 Tianyuan （田园） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::{convert::Infallible, path::Path};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::{
  model::{DetectItem, DetectResult, LabelTable},
  output::Render,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const PALETTE_SIZE: usize = 20;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("invalid font file: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 检测框绘制工具；没有字体时只画边框
#[derive(Clone)]
pub struct Draw {
  font_size: f32,
  font: Option<FontArc>,
  colors: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      font_size: LABEL_FONT_SIZE,
      font: None,
      colors,
    }
  }
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn from_font_file<P: AsRef<Path>>(path: P) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontArc::try_from_vec(data)?;
    info!("已加载字体: {}", path.as_ref().display());
    Ok(Self::default().with_font(font))
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn color_of(&self, class_id: u32) -> Rgb<u8> {
    self.colors[class_id as usize % self.colors.len()]
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem, label: &str) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let color = self.color_of(item.class_id);

    let x_min = ((item.bbox[0] * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((item.bbox[1] * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((item.bbox[2] * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((item.bbox[3] * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..BOX_THICKNESS {
      let width = (x_max - x_min - 2 * t + 1).max(1) as u32;
      let height = (y_max - y_min - 2 * t + 1).max(1) as u32;
      draw_hollow_rect_mut(
        image,
        Rect::at(x_min + t, y_min + t).of_size(width, height),
        color,
      );
    }

    let Some(font) = &self.font else {
      return;
    };

    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, label);
    let label_height = text_height as i32 + 2 * LABEL_TEXT_PADDING;

    // 标签放在边框上方，空间不足时放到框内
    let label_x = x_min;
    let label_y = if y_min >= label_height {
      y_min - label_height
    } else {
      y_min
    };
    let label_width = (text_width as i32 + 2 * LABEL_TEXT_PADDING).min(w as i32 - label_x);
    if label_width <= 0 {
      return;
    }

    draw_filled_rect_mut(
      image,
      Rect::at(label_x, label_y).of_size(label_width as u32, label_height as u32),
      color,
    );
    draw_text_mut(
      image,
      Rgb([255u8, 255u8, 255u8]),
      label_x + LABEL_TEXT_PADDING,
      label_y + LABEL_TEXT_PADDING,
      scale,
      font,
      label,
    );
  }

  /// 在原图副本上绘制全部检测
  pub fn annotate(&self, image: &RgbImage, result: &DetectResult, labels: &LabelTable) -> RgbImage {
    let mut annotated = image.clone();
    for item in result.items.iter() {
      let label = format!("{} {:.2}", labels.name(item.class_id), item.score);
      self.draw_bbox_with_label(&mut annotated, item, &label);
    }
    annotated
  }
}

/// 带类别表的绘制器
pub struct Annotator<'a> {
  pub draw: &'a Draw,
  pub labels: &'a LabelTable,
}

impl Render<RgbImage, DetectResult> for Annotator<'_> {
  type Rendered = RgbImage;
  type Error = Infallible;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<RgbImage, Infallible> {
    Ok(self.draw.annotate(frame, result, self.labels))
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(class_id: u32, bbox: [f32; 4]) -> DetectResult {
    DetectResult::from(vec![DetectItem {
      class_id,
      score: 0.9,
      bbox,
    }])
  }

  #[test]
  fn draws_box_edges_in_class_color() {
    let draw = Draw::default();
    let image = RgbImage::new(100, 100);
    let annotated = draw.annotate(&image, &result(3, [0.25, 0.25, 0.75, 0.75]), &LabelTable::default());

    let color = draw.color_of(3);
    assert_eq!(*annotated.get_pixel(25, 50), color);
    assert_eq!(*annotated.get_pixel(26, 50), color);
    assert_eq!(*annotated.get_pixel(75, 50), color);
    assert_eq!(*annotated.get_pixel(50, 25), color);
    // 框内保持原样
    assert_eq!(*annotated.get_pixel(50, 50), Rgb([0, 0, 0]));
    // 原图不变
    assert_eq!(*image.get_pixel(25, 50), Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let draw = Draw::default();
    let image = RgbImage::new(10, 10);
    let annotated = draw.annotate(&image, &result(0, [0.5, 0.5, 0.5, 0.9]), &LabelTable::default());
    assert_eq!(annotated, image);
  }

  #[test]
  fn palette_wraps_around() {
    let draw = Draw::default();
    assert_eq!(draw.color_of(1), draw.color_of(1 + PALETTE_SIZE as u32));
    assert_ne!(draw.color_of(0), draw.color_of(1));
  }

  #[test]
  fn missing_font_file_is_an_error() {
    assert!(matches!(
      Draw::from_font_file("no/such/font.ttf"),
      Err(DrawError::IoError(_))
    ));
  }
}
