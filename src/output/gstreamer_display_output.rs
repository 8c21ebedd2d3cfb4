// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/output/gstreamer_display_output.rs - GStreamer 窗口显示输出
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

use tracing::info;

use super::gstreamer_video_output::AppSrcPipeline;
use crate::{
  error::SinkWriteError,
  frame::Frame,
  model::DetectionSet,
  output::{Render, draw::Draw},
};

const DISPLAY_PIPELINE: &str = "appsrc name=src ! videoconvert ! autovideosink sync=false";

/// 在窗口中逐帧显示标注结果
pub struct GStreamerDisplayOutput {
  fps: f64,
  draw: Draw,
  display: Option<AppSrcPipeline>,
}

impl GStreamerDisplayOutput {
  pub fn new(fps: f64, draw: Draw) -> Self {
    Self {
      fps,
      draw,
      display: None,
    }
  }

  pub fn frames_shown(&self) -> u64 {
    self.display.as_ref().map_or(0, AppSrcPipeline::frame_count)
  }
}

impl Render for GStreamerDisplayOutput {
  fn render_result(&mut self, frame: &Frame, result: &DetectionSet) -> Result<(), SinkWriteError> {
    let image = self.draw.annotate(&frame.image, result);
    if self.display.is_none() {
      let display =
        AppSrcPipeline::launch(DISPLAY_PIPELINE, frame.width(), frame.height(), self.fps)?;
      display.start()?;
      info!("打开显示窗口 {}x{}", frame.width(), frame.height());
      self.display = Some(display);
    }
    let display = self
      .display
      .as_mut()
      .ok_or_else(|| SinkWriteError::Pipeline("显示管道未初始化".to_string()))?;
    display.push(&image)
  }
}
