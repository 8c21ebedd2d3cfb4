// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::{Parser, Subcommand};
use gaitcheck::{Device, DetectorConfig, LabelMatch};

/// Gaitcheck 步态预检
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型类型: OD, IS, KP, LVIS, PS
  #[arg(long, short = 'm', default_value = "OD", env = "GAITCHECK_MODEL_TYPE")]
  pub model_type: String,

  /// 导出模型（<配置名>.onnx）所在目录
  #[arg(long, default_value = "models", value_name = "DIR", env = "GAITCHECK_MODEL_DIR")]
  pub model_dir: PathBuf,

  /// 推理设备: auto, cuda, cpu
  #[arg(long, default_value = "auto")]
  pub device: Device,

  /// 验证证据帧的保存目录
  #[arg(long, default_value = "output", value_name = "DIR")]
  pub output_root: PathBuf,

  /// 标签匹配方式: exact, substring
  #[arg(long, default_value = "exact")]
  pub label_match: LabelMatch,

  /// 最大处理帧数（0 表示无限制）
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub max_frames: u64,

  /// 标签字体文件（默认查找系统字体）
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 标注单张图片
  Image {
    #[arg(value_name = "FILE")]
    path: PathBuf,
  },
  /// 标注视频并保存为 MP4
  #[cfg(feature = "gstreamer")]
  Video {
    #[arg(value_name = "FILE")]
    path: PathBuf,
  },
  /// 在窗口中逐帧显示标注结果
  #[cfg(feature = "gstreamer")]
  Watch {
    #[arg(value_name = "FILE")]
    path: PathBuf,
  },
  /// 判断视频中是否有人，未通过时退出码为 1
  Validate {
    #[arg(value_name = "FILE")]
    path: PathBuf,
    /// 以 JSON 输出结果
    #[arg(long)]
    json: bool,
  },
  /// 列出所有模型配置
  Profiles {
    #[arg(long)]
    json: bool,
  },
}

impl Args {
  pub fn config(&self) -> DetectorConfig {
    DetectorConfig::default()
      .with_device(self.device)
      .with_model_dir(&self.model_dir)
      .with_output_root(&self.output_root)
      .with_label_match(self.label_match)
      .with_frame_limit(Some(self.max_frames))
      .with_font_path(self.font.clone())
  }
}
