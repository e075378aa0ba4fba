// 该文件是 Tianyuan （田园） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tianyuan::{
  loader::ModelCache,
  model::{DetectOptions, LabelTable},
  output::draw::Draw,
  server::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("Tianyuan 作物检测服务");
  info!("模型地址: {}", args.model);
  info!("置信度阈值: {}", args.confidence);
  info!("NMS 阈值: {}", args.nms_threshold);

  let labels = args
    .labels
    .as_ref()
    .map(|path| {
      LabelTable::from_file(path).with_context(|| format!("无法读取类别文件: {}", path.display()))
    })
    .transpose()?;

  let draw = match &args.font {
    Some(path) => {
      Draw::from_font_file(path).with_context(|| format!("无法加载字体: {}", path.display()))?
    }
    None => {
      warn!("未指定字体，只绘制检测框");
      Draw::default()
    }
  };

  let options = DetectOptions {
    confidence: args.confidence,
    nms_threshold: args.nms_threshold,
    ..DetectOptions::default()
  };
  let cache = ModelCache::from_locator(&args.model, options, labels);

  // 启动时加载模型，失败时页面仍然可访问并显示错误
  let cache = tokio::task::spawn_blocking(move || {
    if cache.get().is_err() {
      warn!("模型不可用，页面将只显示错误信息");
    }
    cache
  })
  .await?;

  let state = Arc::new(AppState { cache, draw });
  let app = server::router(state, args.max_upload_mb * 1024 * 1024);

  let addr: SocketAddr = format!("{}:{}", args.host, args.port)
    .parse()
    .with_context(|| format!("无效的监听地址: {}:{}", args.host, args.port))?;
  info!("服务启动: http://{}", addr);

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
