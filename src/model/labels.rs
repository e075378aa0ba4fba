// 该文件是 Tianyuan （田园） 项目的一部分。
// src/model/labels.rs - 类别标签表
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

use std::{borrow::Cow, collections::BTreeMap, path::Path};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("malformed label table: {0}")]
  Malformed(String),
}

/// 类别编号到名称的映射
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTable {
  names: BTreeMap<u32, String>,
}

impl LabelTable {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: (0u32..).zip(names.into_iter().map(Into::into)).collect(),
    }
  }

  /// 每行一个类别名，行号即类别编号
  pub fn from_lines(text: &str) -> Self {
    Self::new(
      text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty()),
    )
  }

  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelError> {
    let text = std::fs::read_to_string(path)?;
    Ok(Self::from_lines(&text))
  }

  /// 解析 Ultralytics 写入 ONNX 元数据的 `names` 字段，
  /// 形如 `{0: 'tomato', 1: 'leaf'}`
  pub fn from_ultralytics_names(text: &str) -> Result<Self, LabelError> {
    let body = text
      .trim()
      .strip_prefix('{')
      .and_then(|s| s.strip_suffix('}'))
      .ok_or_else(|| LabelError::Malformed("expected a '{...}' literal".to_string()))?;

    let mut names = BTreeMap::new();
    let mut rest = body.trim_start();
    while !rest.is_empty() {
      let (key, after) = rest
        .split_once(':')
        .ok_or_else(|| LabelError::Malformed(format!("missing ':' near '{}'", rest)))?;
      let id: u32 = key
        .trim()
        .parse()
        .map_err(|_| LabelError::Malformed(format!("invalid class id '{}'", key.trim())))?;
      let (name, after) = take_quoted(after.trim_start())?;
      names.insert(id, name);

      rest = after.trim_start();
      if let Some(next) = rest.strip_prefix(',') {
        rest = next.trim_start();
      } else if !rest.is_empty() {
        return Err(LabelError::Malformed(format!(
          "unexpected '{}' after class {}",
          rest, id
        )));
      }
    }

    Ok(Self { names })
  }

  /// 类别名，未知编号返回 `class_<id>`
  pub fn name(&self, class_id: u32) -> Cow<'_, str> {
    match self.names.get(&class_id) {
      Some(name) => Cow::Borrowed(name.as_str()),
      None => Cow::Owned(format!("class_{}", class_id)),
    }
  }

  /// 覆盖全部编号所需的类别数
  pub fn class_count(&self) -> usize {
    self
      .names
      .keys()
      .next_back()
      .map(|&id| id as usize + 1)
      .unwrap_or(0)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

fn take_quoted(text: &str) -> Result<(String, &str), LabelError> {
  let mut chars = text.char_indices();
  let quote = match chars.next() {
    Some((_, quote @ ('\'' | '"'))) => quote,
    _ => {
      return Err(LabelError::Malformed(format!(
        "expected quoted name near '{}'",
        text
      )));
    }
  };

  let mut name = String::new();
  let mut escaped = false;
  for (idx, c) in chars {
    if escaped {
      name.push(c);
      escaped = false;
    } else if c == '\\' {
      escaped = true;
    } else if c == quote {
      return Ok((name, &text[idx + c.len_utf8()..]));
    } else {
      name.push(c);
    }
  }

  Err(LabelError::Malformed(format!("unterminated name '{}'", name)))
}
