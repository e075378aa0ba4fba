// 该文件是 Tianyuan （田园） 项目的一部分。
// tests/pipeline.rs - 检测任务测试
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

mod common;

use std::sync::atomic::Ordering;

use common::{counting_cache, crop_items, png_bytes};
use tianyuan::{
  input::{Upload, UploadError},
  model::ModelError,
  output::{DetectionRow, draw::Draw},
  task::{InferenceError, OneShotTask, PageState},
};

#[test]
fn no_upload_stays_idle() {
  let (cache, _) = counting_cache(crop_items(), false);
  let model = cache.get().unwrap();
  let draw = Draw::default();

  assert!(matches!(
    OneShotTask::new(&draw).run_task(&model, None),
    PageState::Idle
  ));
}

#[test]
fn detections_become_table_rows() {
  let (cache, _) = counting_cache(crop_items(), false);
  let model = cache.get().unwrap();
  let draw = Draw::default();

  let upload = Upload::new("field.png", png_bytes(64, 48));
  let PageState::Detected { rows, .. } = OneShotTask::new(&draw).run_task(&model, Some(upload))
  else {
    panic!("expected detections");
  };

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
fn empty_result_shows_preview_only() {
  let (cache, _) = counting_cache(Vec::new(), false);
  let model = cache.get().unwrap();
  let draw = Draw::default();

  let upload = Upload::new("field.jpg", png_bytes(8, 8));
  assert!(matches!(
    OneShotTask::new(&draw).run_task(&model, Some(upload)),
    PageState::NothingDetected { .. }
  ));
}

#[test]
fn corrupt_upload_is_a_decode_error() {
  let (cache, _) = counting_cache(crop_items(), false);
  let model = cache.get().unwrap();
  let draw = Draw::default();

  let upload = Upload::new("field.png", b"\x89PNG garbage".to_vec());
  let state = OneShotTask::new(&draw).run_task(&model, Some(upload));
  assert!(matches!(
    state,
    PageState::Failed {
      preview: None,
      error: InferenceError::Upload(UploadError::ImageLoadError(_)),
    }
  ));
}

#[test]
fn unsupported_extension_is_rejected_before_decoding() {
  let (cache, _) = counting_cache(crop_items(), false);
  let model = cache.get().unwrap();
  let draw = Draw::default();

  let upload = Upload::new("field.gif", png_bytes(8, 8));
  assert!(matches!(
    OneShotTask::new(&draw).run_task(&model, Some(upload)),
    PageState::Failed {
      error: InferenceError::Upload(UploadError::UnsupportedType(_)),
      ..
    }
  ));
}

#[test]
fn inference_failure_keeps_the_preview() {
  let (cache, _) = counting_cache(crop_items(), true);
  let model = cache.get().unwrap();
  let draw = Draw::default();

  let state = OneShotTask::new(&draw).run_task(&model, Some(Upload::new("a.png", png_bytes(8, 8))));
  assert!(matches!(
    state,
    PageState::Failed {
      preview: Some(_),
      error: InferenceError::Model(ModelError::Runtime(_)),
    }
  ));
}

#[test]
fn failure_does_not_affect_the_next_upload() {
  let (cache, loads) = counting_cache(crop_items(), false);
  let draw = Draw::default();
  let task = OneShotTask::new(&draw);

  let bad = Upload::new("a.png", b"nope".to_vec());
  let model = cache.get().unwrap();
  assert!(matches!(
    task.run_task(&model, Some(bad)),
    PageState::Failed { .. }
  ));

  let good = Upload::new("a.png", png_bytes(16, 16));
  let model = cache.get().unwrap();
  assert!(matches!(
    task.run_task(&model, Some(good)),
    PageState::Detected { .. }
  ));

  assert_eq!(loads.load(Ordering::SeqCst), 1);
}
