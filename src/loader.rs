// 该文件是 Tianyuan （田园） 项目的一部分。
// src/loader.rs - 模型加载与缓存
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

use std::sync::{Arc, Mutex, OnceLock};

use tracing::{error, info};

use crate::model::{DetectOptions, DynModel, LabelTable, ModelBuilder, ModelLoadError};

pub type SharedModel = Arc<Mutex<DynModel>>;

type Loader = Box<dyn Fn() -> Result<DynModel, ModelLoadError> + Send + Sync>;

/// 进程级的模型缓存：加载只发生一次，失败结果同样被缓存
pub struct ModelCache {
  model_name: String,
  loader: Loader,
  slot: OnceLock<Result<SharedModel, ModelLoadError>>,
}

impl ModelCache {
  pub fn new<F>(model_name: impl Into<String>, loader: F) -> Self
  where
    F: Fn() -> Result<DynModel, ModelLoadError> + Send + Sync + 'static,
  {
    Self {
      model_name: model_name.into(),
      loader: Box::new(loader),
      slot: OnceLock::new(),
    }
  }

  /// 按模型地址构建缓存，地址错误在首次加载时报告
  pub fn from_locator(
    locator: &str,
    options: DetectOptions,
    labels: Option<LabelTable>,
  ) -> Self {
    let model_name = ModelBuilder::locate(locator)
      .map(|builder| builder.model_path().display().to_string())
      .unwrap_or_else(|_| locator.to_string());
    let locator = locator.to_string();

    Self::new(model_name, move || {
      ModelBuilder::locate(&locator)?
        .options(options)
        .labels(labels.clone())
        .build()
    })
  }

  pub fn model_name(&self) -> &str {
    &self.model_name
  }

  /// 获取模型；首次调用时加载，之后复用
  pub fn get(&self) -> Result<SharedModel, ModelLoadError> {
    self
      .slot
      .get_or_init(|| {
        info!("正在加载模型: {}", self.model_name);
        let now = std::time::Instant::now();
        match (self.loader)() {
          Ok(model) => {
            info!("模型加载完成，耗时: {:.2?}", now.elapsed());
            Ok(Arc::new(Mutex::new(model)))
          }
          Err(e) => {
            error!("模型加载失败: {}", e);
            Err(e)
          }
        }
      })
      .clone()
  }

  pub fn is_initialized(&self) -> bool {
    self.slot.get().is_some()
  }
}
