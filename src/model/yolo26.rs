// 该文件是 Tianyuan （田园） 项目的一部分。
// src/model/yolo26.rs - YOLO26 RKNN 模型
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
use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::nhwc_u8,
  model::{
    DetectItem, DetectOptions, DetectResult, LabelTable, Model, ModelError, ModelLoadError,
    url_model_path,
  },
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_DEFAULT_CLASS_NUM: usize = 80;
const YOLO26_INPUT_W: u32 = 640;
const YOLO26_INPUT_H: u32 = 640;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];

/// 无 NMS 的 YOLO26 检测头，运行在 Rockchip NPU 上
pub struct Yolo26 {
  context: Context,
  class_num: usize,
  labels: LabelTable,
  options: DetectOptions,
}

#[derive(Debug, Clone)]
pub struct Yolo26Builder {
  model_path: PathBuf,
  options: DetectOptions,
  labels: Option<LabelTable>,
}

impl FromUrlWithScheme for Yolo26Builder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for Yolo26Builder {
  type Error = ModelLoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelLoadError::SchemeMismatch(url.to_string()));
    }

    Ok(Yolo26Builder {
      model_path: PathBuf::from(url_model_path(url)),
      options: DetectOptions::default(),
      labels: None,
    })
  }
}

fn invalid(msg: &str, e: rknpu::Error) -> ModelLoadError {
  ModelLoadError::Invalid(format!("{}: {}", msg, e))
}

impl Yolo26Builder {
  pub fn options(mut self, options: DetectOptions) -> Self {
    self.options = options;
    self
  }

  /// RKNN 模型不携带类别名，需要外部提供
  pub fn labels(mut self, labels: Option<LabelTable>) -> Self {
    self.labels = labels;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn build(self) -> Result<Yolo26, ModelLoadError> {
    if !self.model_path.exists() {
      return Err(ModelLoadError::NotFound(
        self.model_path.display().to_string(),
      ));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let mode_data =
      std::fs::read(&self.model_path).map_err(|e| ModelLoadError::Invalid(e.to_string()))?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, InitFlags::default())
      .map_err(|e| invalid("failed to create RKNN context", e))?;

    let num_inputs = context
      .num_inputs()
      .map_err(|e| invalid("failed to query input count", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| invalid("failed to query output count", e))?;

    if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      );
      return Err(ModelLoadError::Invalid(format!(
        "expected {} input(s) and {} outputs, found {} and {}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      )));
    }

    let labels = self.labels.unwrap_or_default();
    let class_num = match labels.class_count() {
      0 => YOLO26_DEFAULT_CLASS_NUM,
      n => n,
    };
    info!("模型加载完成，类别数: {}", class_num);

    Ok(Yolo26 {
      context,
      class_num,
      labels,
      options: self.options,
    })
  }
}

/// 根据张量大小匹配回归和分类输出
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    Some((tensor2, tensor1))
  } else {
    None
  }
}

/// 解码单个检测头，输出为 NCHW 排布的回归与分类 logits
fn decode_head(
  reg: &[f32],
  cls: &[f32],
  (map_h, map_w): (usize, usize),
  class_num: usize,
  confidence: f32,
  items: &mut Vec<DetectItem>,
) {
  let spatial = map_h * map_w;
  let stride_x = YOLO26_INPUT_W as f32 / map_w as f32;
  let stride_y = YOLO26_INPUT_H as f32 / map_h as f32;

  for h in 0..map_h {
    for w in 0..map_w {
      let idx = h * map_w + w;

      let (max_logit, class_id) = (0..class_num)
        .map(|c| (cls[c * spatial + idx], c))
        .fold((f32::MIN, 0), |best, cur| if cur.0 > best.0 { cur } else { best });
      let score = sigmoid(max_logit);
      if score < confidence {
        continue;
      }

      let grid_x = w as f32 + 0.5;
      let grid_y = h as f32 + 0.5;
      let bbox = [
        ((grid_x - reg[idx]) * stride_x / YOLO26_INPUT_W as f32).clamp(0.0, 1.0),
        ((grid_y - reg[spatial + idx]) * stride_y / YOLO26_INPUT_H as f32).clamp(0.0, 1.0),
        ((grid_x + reg[2 * spatial + idx]) * stride_x / YOLO26_INPUT_W as f32).clamp(0.0, 1.0),
        ((grid_y + reg[3 * spatial + idx]) * stride_y / YOLO26_INPUT_H as f32).clamp(0.0, 1.0),
      ];
      if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
        continue;
      }

      items.push(DetectItem {
        class_id: class_id as u32,
        score,
        bbox,
      });
    }
  }
}

impl Model for Yolo26 {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    // 拉伸到模型输入尺寸，归一化坐标可直接对应原图
    let data = nhwc_u8(input, YOLO26_INPUT_W, YOLO26_INPUT_H);

    debug!("设置模型输入");
    self
      .context
      .set_input(0, &data, TensorFormat::NHWC, TensorType::UInt8)
      .map_err(|e| ModelError::Input(e.to_string()))?;

    debug!("执行模型推理");
    self
      .context
      .run()
      .map_err(|e| ModelError::Runtime(e.to_string()))?;

    let output = self
      .context
      .get_outputs()
      .map_err(|e| ModelError::Output(e.to_string()))?;

    let mut items = Vec::new();
    for (head_idx, &(map_h, map_w)) in YOLO26_HEAD_SIZES.iter().enumerate() {
      let spatial = map_h * map_w;
      let tensor1 = output
        .get_f32(head_idx * 2)
        .map_err(|e| ModelError::Output(e.to_string()))?;
      let tensor2 = output
        .get_f32(head_idx * 2 + 1)
        .map_err(|e| ModelError::Output(e.to_string()))?;

      let (reg, cls) = match_reg_cls_tensors(
        tensor1,
        tensor2,
        4 * spatial,
        self.class_num * spatial,
      )
      .ok_or_else(|| {
        ModelError::Output(format!(
          "head {} sizes {} and {} do not match {} classes",
          head_idx,
          tensor1.len(),
          tensor2.len(),
          self.class_num
        ))
      })?;

      decode_head(
        reg,
        cls,
        (map_h, map_w),
        self.class_num,
        self.options.confidence,
        &mut items,
      );
    }

    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    items.truncate(self.options.max_detections);
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }

  fn labels(&self) -> &LabelTable {
    &self.labels
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
