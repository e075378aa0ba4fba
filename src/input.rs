// 该文件是 Tianyuan （田园） 项目的一部分。
// src/input.rs - 上传图像输入
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

use std::{io::Cursor, path::Path};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};

pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum UploadError {
  #[error("Unsupported file type '{0}', expected one of: jpg, jpeg, png")]
  UnsupportedType(String),
  #[error("Upload error: {0}")]
  Multipart(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Image has no pixels")]
  EmptyImage,
}

/// 浏览器表单中的 `accept` 属性
pub fn accept_attribute() -> String {
  ACCEPTED_EXTENSIONS
    .iter()
    .map(|ext| format!(".{}", ext))
    .collect::<Vec<_>>()
    .join(",")
}

/// 单次请求上传的文件，只在本次渲染中存在
#[derive(Debug, Clone)]
pub struct Upload {
  file_name: String,
  bytes: Vec<u8>,
}

impl Upload {
  pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
    Self {
      file_name: file_name.into(),
      bytes,
    }
  }

  pub fn file_name(&self) -> &str {
    &self.file_name
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  /// 扩展名检查，不区分大小写
  pub fn check_type(&self) -> Result<(), UploadError> {
    let ext = Path::new(&self.file_name)
      .extension()
      .and_then(|ext| ext.to_str())
      .map(str::to_ascii_lowercase)
      .unwrap_or_default();

    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
      Ok(())
    } else {
      error!("不支持的文件类型: {}", self.file_name);
      Err(UploadError::UnsupportedType(self.file_name.clone()))
    }
  }

  /// 按内容识别格式并解码为 RGB 图像
  pub fn decode(&self) -> Result<RgbImage, UploadError> {
    let image = ImageReader::new(Cursor::new(&self.bytes))
      .with_guessed_format()?
      .decode()?
      .into_rgb8();

    if image.width() == 0 || image.height() == 0 {
      return Err(UploadError::EmptyImage);
    }

    debug!(
      "图像解码完成: {} {}x{}",
      self.file_name,
      image.width(),
      image.height()
    );
    Ok(image)
  }
}
