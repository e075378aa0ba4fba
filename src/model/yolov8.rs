// 该文件是 Tianyuan （田园） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 模型
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Letterbox, nchw_f32},
  model::{
    DetectItem, DetectOptions, DetectResult, LabelTable, Model, ModelError, ModelLoadError, nms,
    url_model_path,
  },
};

const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_BOX_CHANNELS: usize = 4;

pub struct Yolov8 {
  session: Session,
  input_name: String,
  output_name: String,
  input_size: (u32, u32), // (宽, 高)
  labels: LabelTable,
  options: DetectOptions,
}

#[derive(Debug, Clone)]
pub struct Yolov8Builder {
  model_path: PathBuf,
  options: DetectOptions,
  labels: Option<LabelTable>,
}

impl FromUrlWithScheme for Yolov8Builder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for Yolov8Builder {
  type Error = ModelLoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelLoadError::SchemeMismatch(url.to_string()));
    }

    Ok(Self::new(url_model_path(url)))
  }
}

impl Yolov8Builder {
  pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
    Self {
      model_path: model_path.into(),
      options: DetectOptions::default(),
      labels: None,
    }
  }

  pub fn options(mut self, options: DetectOptions) -> Self {
    self.options = options;
    self
  }

  /// 覆盖模型元数据中的类别表
  pub fn labels(mut self, labels: Option<LabelTable>) -> Self {
    self.labels = labels;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn build(self) -> Result<Yolov8, ModelLoadError> {
    if !self.model_path.exists() {
      return Err(ModelLoadError::NotFound(
        self.model_path.display().to_string(),
      ));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()
      .map_err(|e| ModelLoadError::Invalid(format!("failed to create session builder: {e}")))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| ModelLoadError::Invalid(format!("failed to set optimization level: {e}")))?
      .commit_from_file(&self.model_path)
      .map_err(|e| ModelLoadError::Invalid(e.to_string()))?;

    let (names, imgsz) = {
      let metadata = session
        .metadata()
        .map_err(|e| ModelLoadError::Invalid(format!("failed to read model metadata: {e}")))?;
      (
        metadata.custom("names").ok().flatten(),
        metadata.custom("imgsz").ok().flatten(),
      )
    };

    let labels = match (self.labels, names) {
      (Some(labels), _) => labels,
      (None, Some(names)) => LabelTable::from_ultralytics_names(&names)
        .map_err(|e| ModelLoadError::Invalid(format!("invalid class names in metadata: {e}")))?,
      (None, None) => {
        warn!("模型元数据中没有类别表，类别将以编号显示");
        LabelTable::default()
      }
    };

    let input_size = imgsz
      .as_deref()
      .and_then(parse_imgsz)
      .unwrap_or((YOLOV8_INPUT_SIZE, YOLOV8_INPUT_SIZE));

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .unwrap_or_else(|| "images".to_string());
    let output_name = session
      .outputs
      .first()
      .map(|output| output.name.clone())
      .ok_or_else(|| ModelLoadError::Invalid("model has no outputs".to_string()))?;

    debug!("模型输入: {} {}x{}", input_name, input_size.0, input_size.1);
    debug!("模型输出: {}", output_name);
    info!("模型加载完成，类别数: {}", labels.len());

    Ok(Yolov8 {
      session,
      input_name,
      output_name,
      input_size,
      labels,
      options: self.options,
    })
  }
}

/// 解析 `imgsz` 元数据，形如 `[640, 640]`（高, 宽）或 `640`
fn parse_imgsz(text: &str) -> Option<(u32, u32)> {
  let dims: Vec<u32> = text
    .split(|c: char| !c.is_ascii_digit())
    .filter(|s| !s.is_empty())
    .map(str::parse)
    .collect::<Result<_, _>>()
    .ok()?;

  match dims.as_slice() {
    [size] if *size > 0 => Some((*size, *size)),
    [height, width] if *height > 0 && *width > 0 => Some((*width, *height)),
    _ => None,
  }
}

impl Model for Yolov8 {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let letterbox = Letterbox::fit(input.dimensions(), self.input_size);
    let tensor = nchw_f32(&letterbox.apply(input));
    let tensor = tensor.as_standard_layout();

    debug!("设置模型输入");
    let input_tensor =
      TensorRef::from_array_view(&tensor).map_err(|e| ModelError::Input(e.to_string()))?;

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => input_tensor])
      .map_err(|e| ModelError::Runtime(e.to_string()))?;

    let output = outputs
      .get(self.output_name.as_str())
      .ok_or_else(|| ModelError::Output(format!("output '{}' not found", self.output_name)))?;
    let (shape, data) = output
      .try_extract_tensor::<f32>()
      .map_err(|e| ModelError::Output(e.to_string()))?;
    let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    debug!("模型输出形状: {:?}", shape);

    let items = decode_output(data, &shape, &letterbox, &self.options)?;
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }

  fn labels(&self) -> &LabelTable {
    &self.labels
  }
}

/// 解码 YOLOv8 检测头输出：`[1, 4 + nc, N]`，部分导出为 `[1, N, 4 + nc]`
fn decode_output(
  data: &[f32],
  shape: &[usize],
  letterbox: &Letterbox,
  options: &DetectOptions,
) -> Result<Vec<DetectItem>, ModelError> {
  let &[_, dim1, dim2] = shape else {
    return Err(ModelError::Output(format!(
      "expected a 3-d output, got shape {:?}",
      shape
    )));
  };

  // 通道数总小于锚点数
  let (channels, anchors, channel_first) = if dim1 <= dim2 {
    (dim1, dim2, true)
  } else {
    (dim2, dim1, false)
  };
  if channels <= YOLOV8_BOX_CHANNELS {
    return Err(ModelError::Output(format!(
      "output has no class scores, shape {:?}",
      shape
    )));
  }
  if data.len() < channels * anchors {
    return Err(ModelError::Output(format!(
      "output holds {} values, shape {:?} needs {}",
      data.len(),
      shape,
      channels * anchors
    )));
  }

  let at = |c: usize, i: usize| {
    if channel_first {
      data[c * anchors + i]
    } else {
      data[i * channels + c]
    }
  };

  let mut candidates = Vec::new();
  for i in 0..anchors {
    let (class_id, score) = (YOLOV8_BOX_CHANNELS..channels)
      .map(|c| (c - YOLOV8_BOX_CHANNELS, at(c, i)))
      .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if score < options.confidence {
      continue;
    }

    let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
    let bbox = letterbox.restore([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]);
    if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
      continue;
    }

    candidates.push(DetectItem {
      class_id: class_id as u32,
      score,
      bbox,
    });
  }

  debug!("阈值过滤后候选框: {}", candidates.len());
  Ok(nms(candidates, options.nms_threshold, options.max_detections))
}
