// 该文件是 Tianyuan （田园） 项目的一部分。
// tests/common/mod.rs - 测试用检测器
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

#![allow(dead_code)]

use std::{
  io::Cursor,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use image::{ImageFormat, Rgb, RgbImage};
use tianyuan::{
  loader::ModelCache,
  model::{DetectItem, DetectResult, DynModel, LabelTable, Model, ModelError},
};

/// 返回固定结果的检测器
pub struct FakeModel {
  pub labels: LabelTable,
  pub items: Vec<DetectItem>,
  pub fail: bool,
}

impl Model for FakeModel {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&mut self, _input: &RgbImage) -> Result<DetectResult, ModelError> {
    if self.fail {
      return Err(ModelError::Runtime("device lost".to_string()));
    }
    Ok(DetectResult::from(self.items.clone()))
  }

  fn labels(&self) -> &LabelTable {
    &self.labels
  }
}

pub fn crop_items() -> Vec<DetectItem> {
  vec![
    DetectItem {
      class_id: 0,
      score: 0.87,
      bbox: [0.125, 0.125, 0.5, 0.5],
    },
    DetectItem {
      class_id: 1,
      score: 0.31,
      bbox: [0.5, 0.5, 0.875, 0.875],
    },
  ]
}

pub fn crop_labels() -> LabelTable {
  LabelTable::new(["tomato", "leaf"])
}

/// 记录加载次数的缓存
pub fn counting_cache(items: Vec<DetectItem>, fail: bool) -> (ModelCache, Arc<AtomicUsize>) {
  let loads = Arc::new(AtomicUsize::new(0));
  let counter = loads.clone();
  let cache = ModelCache::new("best.onnx", move || {
    counter.fetch_add(1, Ordering::SeqCst);
    let model: DynModel = Box::new(FakeModel {
      labels: crop_labels(),
      items: items.clone(),
      fail,
    });
    Ok(model)
  });
  (cache, loads)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([40, 160, 60]));
  let mut bytes = Cursor::new(Vec::new());
  image
    .write_to(&mut bytes, ImageFormat::Png)
    .expect("encode png");
  bytes.into_inner()
}
