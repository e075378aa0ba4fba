// 该文件是 Tianyuan （田园） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use crate::model::DetectItem;

/// 计算两个边界框的 IoU，边界框格式为 [x_min, y_min, x_max, y_max]
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按类别做非极大值抑制，结果按置信度降序
pub fn nms(mut items: Vec<DetectItem>, iou_threshold: f32, max_detections: usize) -> Vec<DetectItem> {
  items.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<DetectItem> = Vec::new();
  for item in items {
    if kept.len() >= max_detections {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|best| best.class_id == item.class_id && iou(&best.bbox, &item.bbox) > iou_threshold);
    if !suppressed {
      kept.push(item);
    }
  }

  kept
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(class_id: u32, score: f32, bbox: [f32; 4]) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox,
    }
  }

  #[test]
  fn iou_of_identical_and_disjoint_boxes() {
    let a = [0.0, 0.0, 0.5, 0.5];
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    assert_eq!(iou(&a, &[0.6, 0.6, 0.9, 0.9]), 0.0);
  }

  #[test]
  fn iou_of_half_overlap() {
    let a = [0.0, 0.0, 0.4, 0.2];
    let b = [0.2, 0.0, 0.6, 0.2];
    // 交集 0.04，并集 0.12
    assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-5);
  }

  #[test]
  fn suppresses_same_class_overlap_only() {
    let kept = nms(
      vec![
        item(0, 0.6, [0.1, 0.1, 0.5, 0.5]),
        item(0, 0.9, [0.1, 0.1, 0.52, 0.5]),
        item(1, 0.7, [0.1, 0.1, 0.5, 0.5]),
      ],
      0.45,
      300,
    );
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].score, 0.9);
    assert_eq!(kept[1].class_id, 1);
  }

  #[test]
  fn caps_the_number_of_detections() {
    let items = (0..10)
      .map(|i| {
        let x = i as f32 * 0.1;
        item(0, 0.5, [x, 0.0, x + 0.05, 0.05])
      })
      .collect();
    assert_eq!(nms(items, 0.45, 4).len(), 4);
  }
}
