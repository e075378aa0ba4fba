// 该文件是 Tianyuan （田园） 项目的一部分。
// src/frame.rs - 模型输入帧
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

use image::{Rgb, RgbImage, imageops::FilterType};
use ndarray::Array4;

const RGB_CHANNELS: usize = 3;
const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]); // 灰色填充

/// 保持宽高比缩放并居中填充到模型输入尺寸
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  src: (u32, u32),
  dst: (u32, u32),
  resized: (u32, u32),
  pad: (u32, u32),
  scale: f32,
}

impl Letterbox {
  /// `src` 为原图 (宽, 高)，`dst` 为模型输入 (宽, 高)
  pub fn fit(src: (u32, u32), dst: (u32, u32)) -> Self {
    let src = (src.0.max(1), src.1.max(1));
    let scale = (dst.0 as f32 / src.0 as f32).min(dst.1 as f32 / src.1 as f32);
    let resized = (
      ((src.0 as f32 * scale).round() as u32).clamp(1, dst.0),
      ((src.1 as f32 * scale).round() as u32).clamp(1, dst.1),
    );
    let pad = ((dst.0 - resized.0) / 2, (dst.1 - resized.1) / 2);

    Self {
      src,
      dst,
      resized,
      pad,
      scale,
    }
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  pub fn pad(&self) -> (u32, u32) {
    self.pad
  }

  pub fn apply(&self, image: &RgbImage) -> RgbImage {
    let resized = image::imageops::resize(image, self.resized.0, self.resized.1, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(self.dst.0, self.dst.1, LETTERBOX_FILL);
    image::imageops::replace(&mut canvas, &resized, self.pad.0 as i64, self.pad.1 as i64);
    canvas
  }

  /// 将模型输入坐标系中的边界框还原为相对原图的归一化坐标
  pub fn restore(&self, bbox: [f32; 4]) -> [f32; 4] {
    let x = |v: f32| ((v - self.pad.0 as f32) / self.scale / self.src.0 as f32).clamp(0.0, 1.0);
    let y = |v: f32| ((v - self.pad.1 as f32) / self.scale / self.src.1 as f32).clamp(0.0, 1.0);
    [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
  }
}

/// RGB 图像转为 NCHW 浮点张量，取值范围 [0, 1]
pub fn nchw_f32(image: &RgbImage) -> Array4<f32> {
  let (width, height) = image.dimensions();
  Array4::from_shape_fn(
    (1, RGB_CHANNELS, height as usize, width as usize),
    |(_, c, y, x)| image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
  )
}

/// RGB 图像按目标尺寸拉伸后的 NHWC 字节
pub fn nhwc_u8(image: &RgbImage, width: u32, height: u32) -> Vec<u8> {
  if image.dimensions() == (width, height) {
    return image.as_raw().clone();
  }
  image::imageops::resize(image, width, height, FilterType::Triangle).into_raw()
}
