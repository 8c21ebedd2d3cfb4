// 该文件是 Gaitcheck （步态预检） 项目的一部分。
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

use anyhow::Result;
use clap::Parser;

use args::{Args, Command};
use gaitcheck::{Detector, profile};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();
  let args = Args::parse();

  if let Command::Profiles { json } = &args.command {
    return print_profiles(*json);
  }

  println!("Gaitcheck 步态预检");
  println!("==================");
  println!("模型类型: {}", args.model_type);
  println!("模型目录: {}", args.model_dir.display());
  println!("推理设备: {}", args.device);
  println!();

  println!("正在加载模型...");
  let mut detector = Detector::from_model_type(&args.model_type, args.config())?;
  println!("模型加载完成");

  match &args.command {
    Command::Image { path } => {
      let output = detector.on_image(path)?;
      println!("结果已保存: {}", output.display());
    }
    #[cfg(feature = "gstreamer")]
    Command::Video { path } => {
      let summary = detector.on_video(path)?;
      println!("处理帧数: {}", summary.frames_processed);
      match summary.output_path {
        Some(output) => println!("结果已保存: {}", output.display()),
        None => println!("输入没有任何帧，未生成输出"),
      }
    }
    #[cfg(feature = "gstreamer")]
    Command::Watch { path } => {
      let summary = detector.on_video_interactive(path)?;
      println!("显示帧数: {}", summary.frames_scanned);
    }
    Command::Validate { path, json } => {
      let result = detector.validate_video(path)?;
      if *json {
        println!("{}", serde_json::to_string_pretty(&result)?);
      } else {
        println!("扫描帧数: {}", result.frames_scanned);
        match &result.evidence_frame_path {
          Some(evidence) => println!("验证通过，证据帧: {}", evidence.display()),
          None => println!("验证未通过：视频中没有发现行人"),
        }
      }
      if !result.passed {
        std::process::exit(1);
      }
    }
    Command::Profiles { .. } => {}
  }

  Ok(())
}

fn print_profiles(json: bool) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(profile::profiles())?);
    return Ok(());
  }
  for profile in profile::profiles() {
    println!(
      "{:<5} {:<22} {:.2}  {}",
      profile.model_type.token(),
      format!("{:?}", profile.task_kind),
      profile.score_threshold,
      profile.config_source
    );
  }
  Ok(())
}
