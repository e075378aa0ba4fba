// 该文件是 Tianyuan （田园） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

mod labels;
mod nms;
mod yolov8;
#[cfg(feature = "model_rknn")]
mod yolo26;

pub use self::labels::{LabelError, LabelTable};
pub use self::nms::{iou, nms};
pub use self::yolov8::{Yolov8, Yolov8Builder};
#[cfg(feature = "model_rknn")]
pub use self::yolo26::{Yolo26, Yolo26Builder};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
  fn labels(&self) -> &LabelTable;
}

/// 进程内共享的检测器，后端由模型地址决定
pub type DynModel =
  Box<dyn Model<Input = RgbImage, Output = DetectResult, Error = ModelError> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，相对原图归一化
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 推理参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectOptions {
  /// 置信度阈值，低于该值的候选框被丢弃
  pub confidence: f32,
  /// NMS IoU 阈值
  pub nms_threshold: f32,
  pub max_detections: usize,
}

impl Default for DetectOptions {
  fn default() -> Self {
    Self {
      confidence: 0.25,
      nms_threshold: 0.45,
      max_detections: 300,
    }
  }
}

/// 模型加载阶段的错误，对整个进程生效
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelLoadError {
  #[error("Model file '{0}' not found in the app directory.")]
  NotFound(String),
  #[error("Error loading YOLO model: {0}")]
  Invalid(String),
  #[error("Unsupported model locator '{0}'")]
  SchemeMismatch(String),
}

/// 单次推理的错误，只影响当前请求
#[derive(Error, Debug)]
pub enum ModelError {
  #[error("failed to build input tensor: {0}")]
  Input(String),
  #[error("inference failed: {0}")]
  Runtime(String),
  #[error("unexpected model output: {0}")]
  Output(String),
}

/// 根据模型地址选择后端
#[derive(Debug, Clone)]
pub enum ModelBuilder {
  Yolov8(Yolov8Builder),
  #[cfg(feature = "model_rknn")]
  Yolo26(Yolo26Builder),
}

impl FromUrl for ModelBuilder {
  type Error = ModelLoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "model_rknn")]
    {
      if url.scheme() == Yolo26Builder::SCHEME {
        return Ok(ModelBuilder::Yolo26(Yolo26Builder::from_url(url)?));
      }
    }
    if url.scheme() == Yolov8Builder::SCHEME {
      return Ok(ModelBuilder::Yolov8(Yolov8Builder::from_url(url)?));
    }
    Err(ModelLoadError::SchemeMismatch(url.to_string()))
  }
}

impl ModelBuilder {
  /// 解析模型地址；不带方案的路径按 ONNX 模型处理
  pub fn locate(locator: &str) -> Result<Self, ModelLoadError> {
    match Url::parse(locator) {
      Ok(url) if url.scheme().len() > 1 => Self::from_url(&url),
      // 单字母方案是 Windows 盘符
      _ => Ok(ModelBuilder::Yolov8(Yolov8Builder::new(locator))),
    }
  }

  pub fn options(self, options: DetectOptions) -> Self {
    match self {
      ModelBuilder::Yolov8(builder) => ModelBuilder::Yolov8(builder.options(options)),
      #[cfg(feature = "model_rknn")]
      ModelBuilder::Yolo26(builder) => ModelBuilder::Yolo26(builder.options(options)),
    }
  }

  pub fn labels(self, labels: Option<LabelTable>) -> Self {
    match self {
      ModelBuilder::Yolov8(builder) => ModelBuilder::Yolov8(builder.labels(labels)),
      #[cfg(feature = "model_rknn")]
      ModelBuilder::Yolo26(builder) => ModelBuilder::Yolo26(builder.labels(labels)),
    }
  }

  pub fn model_path(&self) -> &std::path::Path {
    match self {
      ModelBuilder::Yolov8(builder) => builder.model_path(),
      #[cfg(feature = "model_rknn")]
      ModelBuilder::Yolo26(builder) => builder.model_path(),
    }
  }

  pub fn build(self) -> Result<DynModel, ModelLoadError> {
    match self {
      ModelBuilder::Yolov8(builder) => Ok(Box::new(builder.build()?)),
      #[cfg(feature = "model_rknn")]
      ModelBuilder::Yolo26(builder) => Ok(Box::new(builder.build()?)),
    }
  }
}

/// 模型地址中的路径，处理百分号编码
pub(crate) fn url_model_path(url: &Url) -> String {
  urlencoding::decode(url.path())
    .map(|path| path.into_owned())
    .unwrap_or_else(|_| url.path().to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_path_defaults_to_onnx() {
    let builder = ModelBuilder::locate("best.onnx").unwrap();
    assert!(matches!(builder, ModelBuilder::Yolov8(_)));
    assert_eq!(builder.model_path(), std::path::Path::new("best.onnx"));
  }

  #[test]
  fn onnx_scheme_keeps_relative_path() {
    let builder = ModelBuilder::locate("onnx:models/best.onnx").unwrap();
    assert_eq!(
      builder.model_path(),
      std::path::Path::new("models/best.onnx")
    );
  }

  #[test]
  fn onnx_scheme_decodes_absolute_path() {
    let builder = ModelBuilder::locate("onnx:///srv/crop%20model/best.onnx").unwrap();
    assert_eq!(
      builder.model_path(),
      std::path::Path::new("/srv/crop model/best.onnx")
    );
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let err = ModelBuilder::locate("tflite:///best.tflite").unwrap_err();
    assert!(matches!(err, ModelLoadError::SchemeMismatch(_)));
  }

  #[test]
  fn missing_model_file_is_reported() {
    let err = ModelBuilder::locate("onnx:definitely-missing-model.onnx")
      .unwrap()
      .build()
      .err()
      .unwrap();
    assert_eq!(
      err.to_string(),
      "Model file 'definitely-missing-model.onnx' not found in the app directory."
    );
  }
}
