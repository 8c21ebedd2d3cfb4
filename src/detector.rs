// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/detector.rs - 检测任务入口
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

//! # 检测任务
//!
//! [`Detector`] 持有一个推理器，在多次任务之间复用：
//!
//! - [`Detector::on_image`]：标注单张图片，写到 `<文件名>_processed.<扩展名>`
//! - `Detector::on_video`：标注整个视频，20 fps MP4（需要 `gstreamer` 特性）
//! - `Detector::on_video_interactive`：在窗口中逐帧显示，`q` 回车退出
//! - [`Detector::validate_video`]：判断视频中是否出现行人

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  config::DetectorConfig,
  error::Error,
  input::{self, VideoSource},
  model::Predictor,
  output::{
    EvidenceDirectory, Render, SaveImageFileOutput,
    draw::{ColorMode, Draw, load_font},
  },
  profile::ModelProfile,
  task::{ContinuousTask, OneShotTask, PersonValidation, ScanSummary, Task, ValidationResult},
};

/// 结果文件名后缀
pub const PROCESSED_SUFFIX: &str = "_processed";

/// `dir/photo.jpg` → `dir/photo_processed.jpg`，没有扩展名时直接追加后缀
pub fn processed_path(path: &Path) -> PathBuf {
  let mut name = path.file_stem().map(OsString::from).unwrap_or_default();
  name.push(PROCESSED_SUFFIX);
  if let Some(extension) = path.extension() {
    name.push(".");
    name.push(extension);
  }
  path.with_file_name(name)
}

/// 视频渲染结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderSummary {
  pub frames_processed: u64,
  /// 没有任何帧时不生成文件
  pub output_path: Option<PathBuf>,
}

pub struct Detector<P> {
  predictor: P,
  config: DetectorConfig,
  font: Option<FontArc>,
}

#[cfg(feature = "onnx")]
impl Detector<crate::model::OnnxPredictor> {
  /// 按模型类型标记构建 ONNX 推理器
  pub fn from_model_type(token: &str, config: DetectorConfig) -> Result<Self, Error> {
    let profile = crate::profile::select(token)?;
    let predictor = crate::model::OnnxPredictor::builder(profile)
      .model_dir(&config.model_dir)
      .device(config.device)
      .build()?;
    Ok(Self::new(predictor, config))
  }
}

impl<P: Predictor> Detector<P> {
  pub fn new(predictor: P, config: DetectorConfig) -> Self {
    let font = load_font(config.font_path.as_deref());
    if font.is_none() {
      warn!("未找到可用字体，将不绘制标签文字");
    }
    info!(
      "检测器就绪: {} ({})",
      predictor.profile().model_type,
      predictor.profile().config_source
    );
    Self {
      predictor,
      config,
      font,
    }
  }

  pub fn profile(&self) -> &ModelProfile {
    self.predictor.profile()
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn predictor_mut(&mut self) -> &mut P {
    &mut self.predictor
  }

  fn draw(&self, mode: ColorMode) -> Draw {
    Draw::new(mode, self.font.clone())
  }

  /// 标注单张图片，结果与输入同目录、同格式
  pub fn on_image(&mut self, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let path = path.as_ref();
    let source = input::open_image(path)?;
    let output_path = processed_path(path);
    let mut output =
      SaveImageFileOutput::new(&output_path, self.draw(ColorMode::Image)).with_format(source.format());

    OneShotTask.run_task(source, &mut self.predictor, &mut output)?;
    info!("图片处理完成: {}", output_path.display());
    Ok(output_path)
  }

  /// 处理任意输入源并交给指定输出
  pub fn render_source<S: VideoSource, O: Render>(
    &mut self,
    source: S,
    output: O,
  ) -> Result<ScanSummary, Error> {
    ContinuousTask::default()
      .with_frame_limit(self.config.frame_limit)
      .run_task(source, &mut self.predictor, output)
  }

  #[cfg(feature = "gstreamer")]
  pub fn on_video(&mut self, path: impl AsRef<Path>) -> Result<RenderSummary, Error> {
    use crate::output::GStreamerVideoOutput;

    let path = path.as_ref();
    let source = input::open_video(path)?;
    let mut output = GStreamerVideoOutput::new(
      processed_path(path),
      self.config.video_fps,
      self.draw(ColorMode::Segmentation),
    );

    let summary = self.render_source(source, &mut output)?;
    let output_path = output.finish()?;
    match &output_path {
      Some(output_path) => info!("视频处理完成: {}", output_path.display()),
      None => warn!("输入没有任何帧，未生成输出文件"),
    }
    Ok(RenderSummary {
      frames_processed: summary.frames_scanned,
      output_path,
    })
  }

  #[cfg(feature = "gstreamer")]
  pub fn on_video_interactive(&mut self, path: impl AsRef<Path>) -> Result<ScanSummary, Error> {
    use crate::{output::GStreamerDisplayOutput, task::StopSignal};

    let source = input::open_video(path.as_ref())?;
    let stop = StopSignal::interrupt();
    stop.reset();
    info!("按 q 后回车（或 Ctrl-C）退出");

    let output = GStreamerDisplayOutput::new(
      self.config.video_fps,
      self.draw(ColorMode::Segmentation),
    );
    ContinuousTask::default()
      .with_frame_limit(self.config.frame_limit)
      .with_stop_signal(stop)
      .run_task(source, &mut self.predictor, output)
  }

  /// 打开视频并验证，证据帧写入 `output_root`
  pub fn validate_video(&mut self, path: impl AsRef<Path>) -> Result<ValidationResult, Error> {
    let source = input::open_video(path.as_ref())?;
    self.validate_source(source)
  }

  pub fn validate_source<S: VideoSource>(&mut self, source: S) -> Result<ValidationResult, Error> {
    let sink = EvidenceDirectory::new(&self.config.output_root, self.draw(ColorMode::Image));
    let result = PersonValidation::new(sink)
      .with_match(self.config.label_match)
      .with_frame_limit(self.config.frame_limit)
      .run(source, &mut self.predictor)?;
    info!(
      "验证结果: {} (扫描 {} 帧)",
      if result.passed { "通过" } else { "未通过" },
      result.frames_scanned
    );
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn processed_path_keeps_extension() {
    assert_eq!(
      processed_path(Path::new("photo.jpg")),
      PathBuf::from("photo_processed.jpg")
    );
    assert_eq!(
      processed_path(Path::new("clips/walk.mp4")),
      PathBuf::from("clips/walk_processed.mp4")
    );
  }

  #[test]
  fn processed_path_is_not_idempotent() {
    assert_eq!(
      processed_path(Path::new("photo_processed.jpg")),
      PathBuf::from("photo_processed_processed.jpg")
    );
  }

  #[test]
  fn processed_path_uses_last_extension_only() {
    assert_eq!(
      processed_path(Path::new("dir.v2/archive.tar.gz")),
      PathBuf::from("dir.v2/archive.tar_processed.gz")
    );
    assert_eq!(
      processed_path(Path::new("README")),
      PathBuf::from("README_processed")
    );
  }
}
