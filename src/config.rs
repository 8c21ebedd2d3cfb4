// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/config.rs - 运行配置
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
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigurationError;

/// 视频输出的默认帧率
pub const DEFAULT_VIDEO_FPS: f64 = 20.0;

/// 推理设备
///
/// `Auto` 在构建推理器时解析一次：CUDA 可用则使用 CUDA，否则退回 CPU。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
  #[default]
  Auto,
  Cuda,
  Cpu,
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Auto => f.write_str("auto"),
      Device::Cuda => f.write_str("cuda"),
      Device::Cpu => f.write_str("cpu"),
    }
  }
}

impl FromStr for Device {
  type Err = ConfigurationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "auto" => Ok(Device::Auto),
      "cuda" | "gpu" => Ok(Device::Cuda),
      "cpu" => Ok(Device::Cpu),
      _ => Err(ConfigurationError::UnknownDevice(s.to_string())),
    }
  }
}

/// 类别标签匹配方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelMatch {
  /// 标签与目标完全相同
  #[default]
  Exact,
  /// 标签包含目标字符串
  Substring,
}

impl LabelMatch {
  pub fn matches(&self, label: &str, target: &str) -> bool {
    match self {
      LabelMatch::Exact => label == target,
      LabelMatch::Substring => label.contains(target),
    }
  }
}

impl fmt::Display for LabelMatch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LabelMatch::Exact => f.write_str("exact"),
      LabelMatch::Substring => f.write_str("substring"),
    }
  }
}

impl FromStr for LabelMatch {
  type Err = ConfigurationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "exact" => Ok(LabelMatch::Exact),
      "substring" | "contains" => Ok(LabelMatch::Substring),
      _ => Err(ConfigurationError::UnknownLabelMatch(s.to_string())),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectorConfig {
  pub device: Device,
  /// 导出模型（`<配置名>.onnx`）与标签文件所在目录
  pub model_dir: PathBuf,
  /// 验证任务保存证据帧的目录
  pub output_root: PathBuf,
  pub video_fps: f64,
  pub label_match: LabelMatch,
  /// 最大处理帧数，`None` 表示不限制
  pub frame_limit: Option<u64>,
  pub font_path: Option<PathBuf>,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      device: Device::default(),
      model_dir: PathBuf::from("models"),
      output_root: PathBuf::from("output"),
      video_fps: DEFAULT_VIDEO_FPS,
      label_match: LabelMatch::default(),
      frame_limit: None,
      font_path: None,
    }
  }
}

impl DetectorConfig {
  pub fn with_device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn with_model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
    self.model_dir = model_dir.into();
    self
  }

  pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
    self.output_root = output_root.into();
    self
  }

  pub fn with_video_fps(mut self, fps: f64) -> Self {
    self.video_fps = fps;
    self
  }

  pub fn with_label_match(mut self, label_match: LabelMatch) -> Self {
    self.label_match = label_match;
    self
  }

  pub fn with_frame_limit(mut self, frame_limit: Option<u64>) -> Self {
    self.frame_limit = frame_limit.filter(|n| *n > 0);
    self
  }

  pub fn with_font_path(mut self, font_path: Option<PathBuf>) -> Self {
    self.font_path = font_path;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn device_parses_case_insensitively() {
    assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda);
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("Auto".parse::<Device>().unwrap(), Device::Auto);
    assert!(matches!(
      "tpu".parse::<Device>(),
      Err(ConfigurationError::UnknownDevice(_))
    ));
  }

  #[test]
  fn exact_match_rejects_compound_labels() {
    assert!(LabelMatch::Exact.matches("person", "person"));
    assert!(!LabelMatch::Exact.matches("personal_computer", "person"));
    assert!(LabelMatch::Substring.matches("personal_computer", "person"));
    assert!(!LabelMatch::Substring.matches("bicycle", "person"));
  }

  #[test]
  fn zero_frame_limit_means_unlimited() {
    let config = DetectorConfig::default().with_frame_limit(Some(0));
    assert_eq!(config.frame_limit, None);
    let config = DetectorConfig::default().with_frame_limit(Some(12));
    assert_eq!(config.frame_limit, Some(12));
  }

  #[test]
  fn defaults_match_video_job() {
    let config = DetectorConfig::default();
    assert_eq!(config.video_fps, 20.0);
    assert_eq!(config.label_match, LabelMatch::Exact);
    assert_eq!(config.output_root, PathBuf::from("output"));
  }
}
