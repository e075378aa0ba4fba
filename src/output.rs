// 该文件是 Tianyuan （田园） 项目的一部分。
// src/output.rs - 输出定义
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

use std::io::Cursor;

use base64::Engine;
use image::{ImageFormat, RgbImage};

use crate::model::{DetectResult, LabelTable};

pub mod draw;

pub trait Render<Frame, Output> {
  type Rendered;
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<Self::Rendered, Self::Error>;
}

/// 结果表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRow {
  /// 从 1 开始的序号
  pub index: usize,
  pub class_name: String,
  /// 保留两位小数
  pub confidence: String,
}

/// 按检测器输出顺序生成结果表，每个检测一行
pub fn detection_rows(result: &DetectResult, labels: &LabelTable) -> Vec<DetectionRow> {
  result
    .items
    .iter()
    .enumerate()
    .map(|(i, item)| DetectionRow {
      index: i + 1,
      class_name: labels.name(item.class_id).into_owned(),
      confidence: format!("{:.2}", item.score),
    })
    .collect()
}

/// 以 data URI 形式嵌入页面的 PNG 图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
  data_uri: String,
}

impl EncodedImage {
  pub fn encode_png(image: &RgbImage) -> Result<Self, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    let base64_str = base64::engine::general_purpose::STANDARD.encode(buffer.into_inner());
    Ok(Self {
      data_uri: format!("data:image/png;base64,{}", base64_str),
    })
  }

  pub fn data_uri(&self) -> &str {
    &self.data_uri
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;
  use crate::model::DetectItem;

  fn item(class_id: u32, score: f32) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox: [0.1, 0.1, 0.2, 0.2],
    }
  }

  #[test]
  fn one_row_per_detection_in_order() {
    let labels = LabelTable::new(["tomato", "leaf"]);
    let result = DetectResult::from(vec![item(0, 0.87), item(1, 0.31)]);
    let rows = detection_rows(&result, &labels);

    assert_eq!(
      rows,
      vec![
        DetectionRow {
          index: 1,
          class_name: "tomato".to_string(),
          confidence: "0.87".to_string(),
        },
        DetectionRow {
          index: 2,
          class_name: "leaf".to_string(),
          confidence: "0.31".to_string(),
        },
      ]
    );
  }

  #[test]
  fn confidence_is_rounded_to_two_places() {
    let labels = LabelTable::default();
    let result = DetectResult::from(vec![item(7, 0.996), item(7, 0.254)]);
    let rows = detection_rows(&result, &labels);
    assert_eq!(rows[0].confidence, "1.00");
    assert_eq!(rows[1].confidence, "0.25");
    assert_eq!(rows[1].class_name, "class_7");
  }

  #[test]
  fn no_detections_no_rows() {
    let rows = detection_rows(&DetectResult::default(), &LabelTable::default());
    assert!(rows.is_empty());
  }

  #[test]
  fn png_is_wrapped_in_a_data_uri() {
    let image = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
    let encoded = EncodedImage::encode_png(&image).unwrap();
    assert!(encoded.data_uri().starts_with("data:image/png;base64,iVBORw0KGgo"));
  }
}
