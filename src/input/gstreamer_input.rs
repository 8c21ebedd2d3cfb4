// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
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

//! # GStreamer 视频输入
//!
//! 管道结构：
//!
//! ```text
//! filesrc ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink
//! ```
//!
//! 与摄像头实时流不同，文件输入不丢帧，`appsink` 不与时钟同步，
//! 解码速度由推理速度决定。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev \
//!   gstreamer1.0-plugins-good gstreamer1.0-libav
//! ```

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::VideoSource;
use crate::{
  error::SourceOpenError,
  frame::{Frame, unpack_rgb_rows},
};

const PIPELINE: &str = "filesrc name=src ! decodebin ! videoconvert ! video/x-raw,format=RGB \
                        ! appsink name=sink sync=false max-buffers=4";

/// 等待管道预卷的最长时间
const PREROLL_TIMEOUT_SECS: u64 = 10;

pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  frame_index: u64,
  fps: Option<f64>,
  dimensions: Option<(u32, u32)>,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 输入管道失败: {}", e);
    }
  }
}

impl GStreamerInput {
  pub fn open(path: &Path) -> Result<Self, SourceOpenError> {
    let fail = |reason: String| SourceOpenError::new(path, reason);

    gst::init().map_err(|e| fail(format!("GStreamer 初始化失败: {}", e)))?;
    info!("GStreamer 输入管道: {}", PIPELINE);

    let pipeline = gst::parse::launch(PIPELINE)
      .map_err(|e| fail(format!("无法创建管道: {}", e)))?
      .downcast::<gst::Pipeline>()
      .map_err(|_| fail("无法创建管道".to_string()))?;

    let src = pipeline
      .by_name("src")
      .ok_or_else(|| fail("找不到 filesrc 元素".to_string()))?;
    src.set_property("location", path.to_string_lossy().as_ref());

    let appsink = pipeline
      .by_name("sink")
      .ok_or_else(|| fail("找不到 appsink 元素".to_string()))?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| fail("无法转换为 appsink".to_string()))?;

    let mut input = Self {
      pipeline,
      appsink,
      frame_index: 0,
      fps: None,
      dimensions: None,
    };
    // 预卷失败时 `input` 被丢弃，管道回到 Null
    input.preroll().map_err(fail)?;
    Ok(input)
  }

  fn preroll(&mut self) -> Result<(), String> {
    self
      .pipeline
      .set_state(gst::State::Paused)
      .map_err(|_| self.bus_error().unwrap_or_else(|| "无法启动管道".to_string()))?;

    let (result, _, _) = self
      .pipeline
      .state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
    if result.is_err() {
      return Err(
        self
          .bus_error()
          .unwrap_or_else(|| "管道预卷失败，文件可能不是视频".to_string()),
      );
    }

    if let Some(caps) = self
      .appsink
      .static_pad("sink")
      .and_then(|pad| pad.current_caps())
      && let Ok(info) = gst_video::VideoInfo::from_caps(&caps)
    {
      let fps = info.fps();
      if fps.numer() > 0 && fps.denom() > 0 {
        self.fps = Some(fps.numer() as f64 / fps.denom() as f64);
      }
      self.dimensions = Some((info.width(), info.height()));
      info!(
        "视频尺寸 {}x{}, 帧率 {:?}",
        info.width(),
        info.height(),
        self.fps
      );
    }

    self
      .pipeline
      .set_state(gst::State::Playing)
      .map_err(|e| format!("无法播放管道: {}", e))?;
    Ok(())
  }

  fn bus_error(&self) -> Option<String> {
    let bus = self.pipeline.bus()?;
    let message = bus.timed_pop_filtered(gst::ClockTime::ZERO, &[gst::MessageType::Error])?;
    match message.view() {
      gst::MessageView::Error(err) => Some(err.error().to_string()),
      _ => None,
    }
  }

  fn pull_sample(&self) -> Option<gst::Sample> {
    match self.appsink.pull_sample() {
      Ok(sample) => Some(sample),
      Err(_) => {
        if let Some(message) = self.bus_error() {
          error!("视频解码错误: {}", message);
        } else {
          debug!("视频流结束");
        }
        None
      }
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.pull_sample()?;
    match convert_sample(&sample) {
      Ok((image, timestamp_ms)) => {
        let frame = Frame::new(image, self.frame_index, timestamp_ms);
        self.frame_index += 1;
        Some(frame)
      }
      Err(e) => {
        error!("无法读取第 {} 帧: {}", self.frame_index, e);
        None
      }
    }
  }
}

impl VideoSource for GStreamerInput {
  fn fps(&self) -> Option<f64> {
    self.fps
  }

  fn dimensions(&self) -> Option<(u32, u32)> {
    self.dimensions
  }
}

fn convert_sample(sample: &gst::Sample) -> Result<(RgbImage, u64), String> {
  let buffer = sample.buffer().ok_or("采样中没有缓冲区")?;
  let caps = sample.caps().ok_or("采样中没有 caps")?;
  let info = gst_video::VideoInfo::from_caps(caps).map_err(|_| "无法从 caps 读取视频信息")?;
  if info.format() != gst_video::VideoFormat::Rgb {
    return Err(format!("不支持的像素格式: {:?}", info.format()));
  }

  let map = buffer
    .map_readable()
    .map_err(|e| format!("无法映射缓冲区: {}", e))?;
  // 去掉行尾对齐填充
  let image = unpack_rgb_rows(
    map.as_slice(),
    info.width(),
    info.height(),
    info.stride()[0] as usize,
  )?;

  let timestamp_ms = buffer.pts().map(|pts| pts.mseconds()).unwrap_or(0);
  Ok((image, timestamp_ms))
}
