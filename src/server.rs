// 该文件是 Tianyuan （田园） 项目的一部分。
// src/server.rs - HTTP 页面服务
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

use std::sync::Arc;

use axum::{
  Router,
  extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
  response::Html,
  routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::{
  input::{Upload, UploadError},
  loader::ModelCache,
  output::draw::Draw,
  page::{UPLOAD_FIELD, render_page},
  task::{InferenceError, OneShotTask, PageState},
};

pub struct AppState {
  pub cache: ModelCache,
  pub draw: Draw,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
  Router::new()
    .route("/", get(index).post(detect))
    .with_state(state)
    .layer(DefaultBodyLimit::max(max_upload_bytes))
    .layer(TraceLayer::new_for_http())
}

/// GET / - 上传页面
async fn index(State(state): State<SharedState>) -> Html<String> {
  let page = match state.cache.get() {
    Ok(_) => PageState::Idle,
    Err(e) => PageState::ModelUnavailable(e),
  };
  Html(render_page(&page, state.cache.model_name()))
}

/// POST / - 上传图像并检测
async fn detect(State(state): State<SharedState>, multipart: Multipart) -> Html<String> {
  let model = match state.cache.get() {
    Ok(model) => model,
    Err(e) => {
      warn!("模型不可用，忽略上传");
      return Html(render_page(
        &PageState::ModelUnavailable(e),
        state.cache.model_name(),
      ));
    }
  };

  let page = match read_upload(multipart).await {
    Ok(upload) => {
      let task_state = state.clone();
      tokio::task::spawn_blocking(move || OneShotTask::new(&task_state.draw).run_task(&model, upload))
        .await
        .unwrap_or_else(|e| PageState::failed(None, InferenceError::Aborted(e.to_string())))
    }
    Err(e) => {
      warn!("读取上传内容失败: {}", e);
      PageState::failed(None, UploadError::Multipart(e.body_text()))
    }
  };

  Html(render_page(&page, state.cache.model_name()))
}

/// 读取表单中的文件字段；未选择文件时返回 `None`
async fn read_upload(mut multipart: Multipart) -> Result<Option<Upload>, MultipartError> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }

    let file_name = field.file_name().unwrap_or_default().to_string();
    let bytes = field.bytes().await?;
    debug!("表单文件字段: '{}' {} 字节", file_name, bytes.len());

    // 浏览器在未选择文件时仍会提交一个空字段
    if file_name.is_empty() && bytes.is_empty() {
      return Ok(None);
    }
    return Ok(Some(Upload::new(file_name, bytes.to_vec())));
  }

  Ok(None)
}
