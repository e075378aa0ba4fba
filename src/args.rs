// 该文件是 Tianyuan （田园） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;

/// Tianyuan 作物检测页面
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  /// 支持格式:
  /// - ONNX: best.onnx, onnx:best.onnx 或 onnx:///abs/path/best.onnx
  /// - RKNN: rknn:///abs/path/model.rknn（需启用 model_rknn 特性）
  #[arg(long, default_value = "onnx:best.onnx", value_name = "MODEL")]
  pub model: String,

  /// 类别文件，每行一个类别名，覆盖模型自带的类别表
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 标签字体文件 (TTF/OTF)，未指定时只绘制检测框
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD", value_parser = unit_interval)]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD", value_parser = unit_interval)]
  pub nms_threshold: f32,

  /// 监听地址
  #[arg(long, default_value = "127.0.0.1")]
  pub host: String,

  /// 监听端口
  #[arg(short, long, default_value = "8501")]
  pub port: u16,

  /// 上传大小上限 (MiB)
  #[arg(long, default_value = "32", value_name = "MIB")]
  pub max_upload_mb: usize,
}

fn unit_interval(s: &str) -> Result<f32, String> {
  let value: f32 = s.parse().map_err(|e| format!("{}", e))?;
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(format!("{} 不在 0.0 - 1.0 范围内", value))
  }
}
