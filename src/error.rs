// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/error.rs - 错误定义
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

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// 目录列表最多展示的条目数
const LISTING_LIMIT: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigurationError {
  #[error("未知的模型类型: '{0}' (可选: OD, IS, KP, LVIS, PS)")]
  UnknownModelType(String),
  #[error("未知的推理设备: '{0}' (可选: auto, cuda, cpu)")]
  UnknownDevice(String),
  #[error("未知的标签匹配方式: '{0}' (可选: exact, substring)")]
  UnknownLabelMatch(String),
  #[error("模型文件不存在: {} (请先导出权重 {})", .path.display(), .weights)]
  ModelFileMissing { path: PathBuf, weights: String },
  #[error("标签文件错误 {}: {}", .path.display(), .source)]
  Vocabulary {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("推理后端初始化失败: {0}")]
  Backend(String),
}

/// 输入源打开失败
///
/// 附带工作目录与所在目录的文件列表，便于排查相对路径问题。
#[derive(Debug)]
pub struct SourceOpenError {
  pub path: PathBuf,
  pub working_dir: Option<PathBuf>,
  pub listing: Vec<String>,
  pub reason: String,
}

impl SourceOpenError {
  pub fn new(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
    let path = path.as_ref().to_path_buf();
    let working_dir = std::env::current_dir().ok();
    let listing = list_directory(&path, working_dir.as_deref());

    Self {
      path,
      working_dir,
      listing,
      reason: reason.into(),
    }
  }
}

impl fmt::Display for SourceOpenError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "无法打开输入源 {}: {}", self.path.display(), self.reason)?;
    match &self.working_dir {
      Some(dir) => write!(f, "; 当前目录: {}", dir.display())?,
      None => write!(f, "; 当前目录: <未知>")?,
    }
    if self.listing.is_empty() {
      write!(f, "; 目录为空或不可读")
    } else {
      write!(f, "; 目录内容: [{}]", self.listing.join(", "))
    }
  }
}

impl std::error::Error for SourceOpenError {}

fn list_directory(path: &Path, working_dir: Option<&Path>) -> Vec<String> {
  let directory = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => match working_dir {
      Some(dir) => dir.to_path_buf(),
      None => return Vec::new(),
    },
  };

  let Ok(entries) = std::fs::read_dir(&directory) else {
    return Vec::new();
  };

  let mut names: Vec<String> = entries
    .filter_map(|entry| entry.ok())
    .map(|entry| entry.file_name().to_string_lossy().into_owned())
    .collect();
  names.sort();
  if names.len() > LISTING_LIMIT {
    let rest = names.len() - LISTING_LIMIT;
    names.truncate(LISTING_LIMIT);
    names.push(format!("... (另有 {} 项)", rest));
  }
  names
}

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("帧为空: {width}x{height}")]
  EmptyFrame { width: u32, height: u32 },
  #[error("类别编号 {id} 超出标签表范围 ({size})")]
  UnknownClass { id: i64, size: usize },
  #[error("模型缺少输出: {0}")]
  MissingOutput(&'static str),
  #[error("输出 {name} 形状不符合预期: {shape:?}")]
  ShapeMismatch { name: &'static str, shape: Vec<usize> },
  #[error("推理后端错误: {0}")]
  Backend(String),
}

#[derive(Error, Debug)]
pub enum SinkWriteError {
  #[error("无法创建输出目录 {}: {}", .path.display(), .source)]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("无法写入图像 {}: {}", .path.display(), .source)]
  Encode {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("输出管道错误: {0}")]
  Pipeline(String),
}

#[derive(Error, Debug)]
pub enum Error {
  #[error("配置错误: {0}")]
  Configuration(#[from] ConfigurationError),
  #[error("{0}")]
  SourceOpen(#[from] SourceOpenError),
  #[error("推理错误: {0}")]
  Inference(#[from] InferenceError),
  #[error("输出错误: {0}")]
  SinkWrite(#[from] SinkWriteError),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn source_open_error_reports_path_and_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("walk.mp4"), b"").unwrap();
    let missing = dir.path().join("missing.mp4");

    let err = SourceOpenError::new(&missing, "文件不存在");
    let message = err.to_string();

    assert!(message.contains("missing.mp4"));
    assert!(message.contains("文件不存在"));
    assert!(message.contains("walk.mp4"));
    assert_eq!(err.listing, vec!["walk.mp4".to_string()]);
  }

  #[test]
  fn listing_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..(LISTING_LIMIT + 5) {
      std::fs::write(dir.path().join(format!("{:03}.jpg", i)), b"").unwrap();
    }

    let err = SourceOpenError::new(dir.path().join("x.mp4"), "测试");
    assert_eq!(err.listing.len(), LISTING_LIMIT + 1);
    assert!(err.listing.last().unwrap().contains("5"));
  }
}
