// 该文件是 Tianyuan （田园） 项目的一部分。
// src/task.rs - 单次请求的检测任务
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

use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  input::{Upload, UploadError},
  loader::SharedModel,
  model::{ModelError, ModelLoadError},
  output::{
    DetectionRow, EncodedImage, Render, detection_rows,
    draw::{Annotator, Draw},
  },
};

/// 单次请求中的错误，不影响之后的上传
#[derive(Error, Debug)]
pub enum InferenceError {
  #[error(transparent)]
  Upload(#[from] UploadError),
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error("Image encoding error: {0}")]
  Encode(#[from] image::ImageError),
  #[error("Detector is unavailable after an earlier failure")]
  Poisoned,
  #[error("Detection task aborted: {0}")]
  Aborted(String),
}

/// 页面状态，对应一次请求的终态
#[derive(Debug)]
pub enum PageState {
  /// 模型未能加载，整个页面不可用
  ModelUnavailable(ModelLoadError),
  /// 尚未选择文件
  Idle,
  Detected {
    preview: EncodedImage,
    annotated: EncodedImage,
    rows: Vec<DetectionRow>,
    elapsed: Duration,
  },
  NothingDetected {
    preview: EncodedImage,
  },
  Failed {
    preview: Option<EncodedImage>,
    error: InferenceError,
  },
}

impl PageState {
  pub fn failed(preview: Option<EncodedImage>, error: impl Into<InferenceError>) -> Self {
    PageState::Failed {
      preview,
      error: error.into(),
    }
  }
}

/// 解码、推理、渲染，依次执行
pub struct OneShotTask<'a> {
  draw: &'a Draw,
}

impl<'a> OneShotTask<'a> {
  pub fn new(draw: &'a Draw) -> Self {
    Self { draw }
  }

  pub fn run_task(&self, model: &SharedModel, upload: Option<Upload>) -> PageState {
    let Some(upload) = upload else {
      return PageState::Idle;
    };

    info!(
      "收到上传文件: {} ({} 字节)",
      upload.file_name(),
      upload.len()
    );
    let image = match upload.check_type().and_then(|_| upload.decode()) {
      Ok(image) => image,
      Err(e) => {
        warn!("图像解码失败: {}", e);
        return PageState::failed(None, e);
      }
    };

    let preview = match EncodedImage::encode_png(&image) {
      Ok(preview) => preview,
      Err(e) => return PageState::failed(None, e),
    };

    match self.detect(model, &image) {
      Ok(None) => PageState::NothingDetected { preview },
      Ok(Some(detection)) => match EncodedImage::encode_png(&detection.annotated) {
        Ok(annotated) => PageState::Detected {
          preview,
          annotated,
          rows: detection.rows,
          elapsed: detection.elapsed,
        },
        Err(e) => PageState::failed(Some(preview), e),
      },
      Err(e) => {
        warn!("检测失败: {}", e);
        PageState::failed(Some(preview), e)
      }
    }
  }

  /// 没有检测结果时返回 `None`
  fn detect(
    &self,
    model: &SharedModel,
    image: &RgbImage,
  ) -> Result<Option<Detection>, InferenceError> {
    let mut model = model.lock().map_err(|_| InferenceError::Poisoned)?;

    info!("开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(image)?;
    let elapsed = now.elapsed();
    info!("推理完成，检测到 {} 个目标，耗时: {:.2?}", result.len(), elapsed);

    if result.is_empty() {
      return Ok(None);
    }

    let rows = detection_rows(&result, model.labels());
    let annotator = Annotator {
      draw: self.draw,
      labels: model.labels(),
    };
    let Ok(annotated) = annotator.render_result(image, &result);

    Ok(Some(Detection {
      annotated,
      rows,
      elapsed,
    }))
  }
}

struct Detection {
  annotated: RgbImage,
  rows: Vec<DetectionRow>,
  elapsed: Duration,
}
