// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出
//!
//! 把标注后的帧编码为 H.264，写入 MP4 容器：
//!
//! ```text
//! appsrc ! videoconvert ! video/x-raw,format=I420 ! x264enc ! h264parse ! mp4mux ! filesink
//! ```
//!
//! 管道在收到第一帧时才创建，尺寸取自该帧。没有帧就不会生成文件。

use std::path::{Path, PathBuf};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::{info, warn};

use crate::{
  error::SinkWriteError,
  frame::{Frame, pack_rgb_rows},
  model::DetectionSet,
  output::{Render, draw::Draw},
};

const ENCODE_PIPELINE: &str = "appsrc name=src ! videoconvert ! video/x-raw,format=I420 \
                               ! x264enc speed-preset=fast ! h264parse ! mp4mux \
                               ! filesink name=sink";

/// 等待 EOS 写完文件尾的最长时间
const EOS_TIMEOUT_SECS: u64 = 10;

fn pipeline_error(message: impl std::fmt::Display) -> SinkWriteError {
  SinkWriteError::Pipeline(message.to_string())
}

/// 由 appsrc 驱动的管道，推入 RGB 帧
pub(crate) struct AppSrcPipeline {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  info: gst_video::VideoInfo,
  fps: f64,
  frame_count: u64,
  finished: bool,
}

impl AppSrcPipeline {
  pub(crate) fn launch(
    description: &str,
    width: u32,
    height: u32,
    fps: f64,
  ) -> Result<Self, SinkWriteError> {
    gst::init().map_err(pipeline_error)?;
    info!("GStreamer 输出管道: {}", description);

    let pipeline = gst::parse::launch(description)
      .map_err(pipeline_error)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| pipeline_error("无法创建管道"))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or_else(|| pipeline_error("找不到 appsrc 元素"))?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| pipeline_error("无法转换为 appsrc"))?;

    // 行跨度按 caps 的默认布局对齐，宽度不是 4 的倍数时每行有填充
    let fps_milli = (fps * 1000.0).round().max(1.0) as i32;
    let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, width, height)
      .fps(gst::Fraction::new(fps_milli, 1000))
      .build()
      .map_err(pipeline_error)?;
    let caps = info.to_caps().map_err(pipeline_error)?;
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    Ok(Self {
      pipeline,
      appsrc,
      info,
      fps,
      frame_count: 0,
      finished: false,
    })
  }

  pub(crate) fn pipeline(&self) -> &gst::Pipeline {
    &self.pipeline
  }

  pub(crate) fn start(&self) -> Result<(), SinkWriteError> {
    self
      .pipeline
      .set_state(gst::State::Playing)
      .map_err(pipeline_error)?;
    Ok(())
  }

  pub(crate) fn frame_count(&self) -> u64 {
    self.frame_count
  }

  pub(crate) fn push(&mut self, image: &image::RgbImage) -> Result<(), SinkWriteError> {
    if image.width() != self.info.width() || image.height() != self.info.height() {
      return Err(pipeline_error(format!(
        "帧尺寸 {}x{} 与输出 {}x{} 不一致",
        image.width(),
        image.height(),
        self.info.width(),
        self.info.height()
      )));
    }
    self.check_bus()?;

    let stride = self.info.stride()[0] as usize;
    let mut buffer = gst::Buffer::with_size(self.info.size()).map_err(pipeline_error)?;
    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or_else(|| pipeline_error("缓冲区不可写"))?;
      let frame_ns = (1_000_000_000.0 / self.fps) as u64;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(self.frame_count * frame_ns));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame_ns));
      let mut map = buffer_ref
        .map_writable()
        .map_err(|_| pipeline_error("无法映射缓冲区"))?;
      pack_rgb_rows(image, stride, map.as_mut_slice()).map_err(pipeline_error)?;
    }

    self
      .appsrc
      .push_buffer(buffer)
      .map_err(|e| pipeline_error(format!("推送缓冲区失败: {:?}", e)))?;
    self.frame_count += 1;
    Ok(())
  }

  fn check_bus(&self) -> Result<(), SinkWriteError> {
    let Some(bus) = self.pipeline.bus() else {
      return Ok(());
    };
    if let Some(message) = bus.pop_filtered(&[gst::MessageType::Error])
      && let gst::MessageView::Error(err) = message.view()
    {
      return Err(pipeline_error(err.error()));
    }
    Ok(())
  }

  /// 发送 EOS 并等待管道处理完毕
  pub(crate) fn finish(&mut self) -> Result<(), SinkWriteError> {
    if self.finished {
      return Ok(());
    }
    self.finished = true;

    let _ = self.appsrc.end_of_stream();
    let mut result = Ok(());
    if let Some(bus) = self.pipeline.bus() {
      let message = bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
        &[gst::MessageType::Eos, gst::MessageType::Error],
      );
      match message.as_ref().map(|message| message.view()) {
        Some(gst::MessageView::Error(err)) => result = Err(pipeline_error(err.error())),
        Some(_) => {}
        None => warn!("等待 EOS 超时"),
      }
    }

    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 输出管道失败: {}", e);
    }
    result
  }
}

impl Drop for AppSrcPipeline {
  fn drop(&mut self) {
    if let Err(e) = self.finish() {
      warn!("关闭输出管道时出错: {}", e);
    }
  }
}

pub struct GStreamerVideoOutput {
  path: PathBuf,
  fps: f64,
  draw: Draw,
  encoder: Option<AppSrcPipeline>,
}

impl GStreamerVideoOutput {
  pub fn new(path: impl Into<PathBuf>, fps: f64, draw: Draw) -> Self {
    Self {
      path: path.into(),
      fps,
      draw,
      encoder: None,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn frames_written(&self) -> u64 {
    self.encoder.as_ref().map_or(0, AppSrcPipeline::frame_count)
  }

  /// 写完文件尾；没有写入任何帧时返回 `None`
  pub fn finish(mut self) -> Result<Option<PathBuf>, SinkWriteError> {
    match self.encoder.take() {
      Some(mut encoder) => {
        encoder.finish()?;
        info!(
          "视频输出完成: {} ({} 帧)",
          self.path.display(),
          encoder.frame_count()
        );
        Ok(Some(self.path.clone()))
      }
      None => Ok(None),
    }
  }

  fn encoder(&mut self, width: u32, height: u32) -> Result<&mut AppSrcPipeline, SinkWriteError> {
    if self.encoder.is_none() {
      if let Some(parent) = self.path.parent()
        && !parent.as_os_str().is_empty()
      {
        std::fs::create_dir_all(parent).map_err(|source| SinkWriteError::CreateDir {
          path: parent.to_path_buf(),
          source,
        })?;
      }

      let encoder = AppSrcPipeline::launch(ENCODE_PIPELINE, width, height, self.fps)?;
      let sink = encoder
        .pipeline()
        .by_name("sink")
        .ok_or_else(|| pipeline_error("找不到 filesink 元素"))?;
      sink.set_property("location", self.path.to_string_lossy().as_ref());
      encoder.start()?;
      info!(
        "视频输出: {}x{} @ {} fps -> {}",
        width,
        height,
        self.fps,
        self.path.display()
      );
      self.encoder = Some(encoder);
    }
    self
      .encoder
      .as_mut()
      .ok_or_else(|| pipeline_error("输出管道未初始化"))
  }
}

impl Render for GStreamerVideoOutput {
  fn render_result(&mut self, frame: &Frame, result: &DetectionSet) -> Result<(), SinkWriteError> {
    let image = self.draw.annotate(&frame.image, result);
    self.encoder(frame.width(), frame.height())?.push(&image)
  }
}
