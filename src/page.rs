// 该文件是 Tianyuan （田园） 项目的一部分。
// src/page.rs - 页面渲染
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

use std::fmt::Write;

use crate::{
  input::accept_attribute,
  output::{DetectionRow, EncodedImage},
  task::PageState,
};

pub const PAGE_TITLE: &str = "YOLOv8 Crop Classification";
pub const IDLE_MESSAGE: &str = "Please upload an image to get started.";
pub const EMPTY_MESSAGE: &str = "No crops detected in this image.";
pub const UPLOAD_FIELD: &str = "file";

const STYLE: &str = "\
body{margin:0;font-family:sans-serif;display:flex;min-height:100vh}\
aside{width:18rem;padding:1.5rem;background:#f0f2f6}\
main{flex:1;padding:1.5rem 3rem}\
figure{margin:1rem 0}figure img{max-width:100%}\
figcaption{color:#666;text-align:center}\
table{border-collapse:collapse}td,th{border:1px solid #ddd;padding:.3rem .8rem}\
.info{background:#e8f0fe;padding:.8rem}.error{background:#fde8e8;padding:.8rem}\
.warning{background:#fff6e0;padding:.8rem}";

/// 转义 HTML 特殊字符
pub fn escape_html(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(c),
    }
  }
  escaped
}

/// 渲染完整页面；`model_name` 用于模型缺失时的提示
pub fn render_page(state: &PageState, model_name: &str) -> String {
  let mut html = String::new();
  let _ = write!(
    html,
    "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
     <title>{}</title>\
     <link rel=\"icon\" href=\"data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>🪴</text></svg>\">\
     <style>{}</style></head><body>",
    PAGE_TITLE, STYLE
  );

  render_sidebar(&mut html);

  html.push_str("<main><h1>🌿 YOLOv8 Crop Image Classification</h1>");
  html.push_str("<p>Upload an image to detect and classify crops using a YOLOv8 model.</p>");

  match state {
    PageState::ModelUnavailable(error) => {
      message(&mut html, "error", &error.to_string());
      message(
        &mut html,
        "warning",
        &format!(
          "Model could not be loaded. Make sure '{}' is present in the repository.",
          model_name
        ),
      );
    }
    PageState::Idle => {
      render_form(&mut html);
      message(&mut html, "info", IDLE_MESSAGE);
    }
    PageState::Detected {
      preview,
      annotated,
      rows,
      elapsed,
    } => {
      render_form(&mut html);
      figure(&mut html, preview, "Uploaded Image");
      html.push_str("<h3>🔍 Detection Results:</h3>");
      figure(&mut html, annotated, "Detection Output");
      html.push_str("<h3>📊 Detected Objects:</h3>");
      render_table(&mut html, rows);
      let _ = write!(html, "<p><small>Inference took {:.2?}</small></p>", elapsed);
    }
    PageState::NothingDetected { preview } => {
      render_form(&mut html);
      figure(&mut html, preview, "Uploaded Image");
      html.push_str("<h3>🔍 Detection Results:</h3>");
      message(&mut html, "info", EMPTY_MESSAGE);
    }
    PageState::Failed { preview, error } => {
      render_form(&mut html);
      if let Some(preview) = preview {
        figure(&mut html, preview, "Uploaded Image");
      }
      message(&mut html, "error", &format!("Error during detection: {}", error));
    }
  }

  html.push_str("</main></body></html>");
  html
}

fn render_sidebar(html: &mut String) {
  html.push_str(
    "<aside><h2>About</h2>\
     <p class=\"info\">This app uses a YOLOv8 model to detect and classify crops in aerial or field images.</p>\
     <p>Built with <a href=\"https://github.com/ultralytics/ultralytics\">Ultralytics YOLOv8</a> \
     and <a href=\"https://onnxruntime.ai\">ONNX Runtime</a></p></aside>",
  );
}

fn render_form(html: &mut String) {
  let _ = write!(
    html,
    "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\
     <label>Upload an image <input type=\"file\" name=\"{}\" accept=\"{}\"></label> \
     <button type=\"submit\">Detect</button></form>",
    UPLOAD_FIELD,
    accept_attribute()
  );
}

fn render_table(html: &mut String, rows: &[DetectionRow]) {
  html.push_str("<table><thead><tr><th>Object</th><th>Class</th><th>Confidence</th></tr></thead><tbody>");
  for row in rows {
    let _ = write!(
      html,
      "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
      row.index,
      escape_html(&row.class_name),
      escape_html(&row.confidence)
    );
  }
  html.push_str("</tbody></table>");
}

fn figure(html: &mut String, image: &EncodedImage, caption: &str) {
  let _ = write!(
    html,
    "<figure><img src=\"{}\" alt=\"{}\"><figcaption>{}</figcaption></figure>",
    image.data_uri(),
    caption,
    caption
  );
}

fn message(html: &mut String, class: &str, text: &str) {
  let _ = write!(html, "<p class=\"{}\">{}</p>", class, escape_html(text));
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use image::{Rgb, RgbImage};

  use super::*;
  use crate::{input::UploadError, model::ModelLoadError, task::InferenceError};

  fn preview() -> EncodedImage {
    EncodedImage::encode_png(&RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]))).unwrap()
  }

  #[test]
  fn escapes_markup() {
    assert_eq!(
      escape_html("<b>\"tom&jerry's\"</b>"),
      "&lt;b&gt;&quot;tom&amp;jerry&#39;s&quot;&lt;/b&gt;"
    );
  }

  #[test]
  fn idle_page_has_form_and_prompt() {
    let html = render_page(&PageState::Idle, "best.onnx");
    assert!(html.contains("<form"));
    assert!(html.contains("accept=\".jpg,.jpeg,.png\""));
    assert!(html.contains(IDLE_MESSAGE));
    assert!(html.contains("<h2>About</h2>"));
    assert!(!html.contains("<table"));
  }

  #[test]
  fn unavailable_model_hides_the_form() {
    let state = PageState::ModelUnavailable(ModelLoadError::NotFound("best.onnx".to_string()));
    let html = render_page(&state, "best.onnx");
    assert!(!html.contains("<form"));
    assert!(html.contains("Model file &#39;best.onnx&#39; not found in the app directory."));
    assert!(html.contains("Model could not be loaded."));
  }

  #[test]
  fn detections_render_one_row_each() {
    let state = PageState::Detected {
      preview: preview(),
      annotated: preview(),
      rows: vec![
        DetectionRow {
          index: 1,
          class_name: "tomato".to_string(),
          confidence: "0.87".to_string(),
        },
        DetectionRow {
          index: 2,
          class_name: "<leaf>".to_string(),
          confidence: "0.31".to_string(),
        },
      ],
      elapsed: Duration::from_millis(12),
    };
    let html = render_page(&state, "best.onnx");
    assert_eq!(html.matches("<tr><td>").count(), 2);
    assert!(html.contains("<tr><td>1</td><td>tomato</td><td>0.87</td></tr>"));
    assert!(html.contains("<td>&lt;leaf&gt;</td>"));
    assert!(html.contains("Detection Output"));
  }

  #[test]
  fn empty_result_has_no_table() {
    let html = render_page(&PageState::NothingDetected { preview: preview() }, "best.onnx");
    assert!(html.contains(EMPTY_MESSAGE));
    assert!(html.contains("Uploaded Image"));
    assert!(!html.contains("<table"));
  }

  #[test]
  fn failure_is_reported_without_preview() {
    let state = PageState::failed(None, UploadError::EmptyImage);
    let html = render_page(&state, "best.onnx");
    assert!(html.contains("Error during detection: Image has no pixels"));
    assert!(!html.contains("<figure>"));
    assert!(html.contains("<form"));

    let state = PageState::failed(Some(preview()), InferenceError::Poisoned);
    assert!(render_page(&state, "best.onnx").contains("<figure>"));
  }
}
