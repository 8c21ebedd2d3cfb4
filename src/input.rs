// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use std::collections::VecDeque;
use std::path::Path;

use image::RgbImage;

use crate::{error::SourceOpenError, frame::Frame};

/// 帧输入源
///
/// 迭代结束即视为流结束。底层资源在 `Drop` 时释放。
pub trait VideoSource: Iterator<Item = Frame> {
  /// 帧率（如果已知）
  fn fps(&self) -> Option<f64> {
    None
  }

  /// 帧尺寸（如果已知）
  fn dimensions(&self) -> Option<(u32, u32)> {
    None
  }
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
  fn fps(&self) -> Option<f64> {
    (**self).fps()
  }

  fn dimensions(&self) -> Option<(u32, u32)> {
    (**self).dimensions()
  }
}

mod image_file;
pub use self::image_file::ImageFileSource;

#[cfg(feature = "gstreamer")]
mod gstreamer_input;
#[cfg(feature = "gstreamer")]
pub use self::gstreamer_input::GStreamerInput;

/// 内存中的帧序列
#[derive(Debug, Default)]
pub struct InMemorySource {
  frames: VecDeque<Frame>,
  fps: Option<f64>,
}

impl InMemorySource {
  pub fn new(frames: Vec<Frame>) -> Self {
    Self {
      frames: frames.into(),
      fps: None,
    }
  }

  /// 按顺序编号的图像序列
  pub fn from_images(images: impl IntoIterator<Item = RgbImage>, fps: f64) -> Self {
    let step = if fps > 0.0 { 1000.0 / fps } else { 0.0 };
    let frames = images
      .into_iter()
      .enumerate()
      .map(|(i, image)| Frame::new(image, i as u64, (i as f64 * step) as u64))
      .collect();
    Self {
      frames,
      fps: Some(fps),
    }
  }

  pub fn remaining(&self) -> usize {
    self.frames.len()
  }
}

impl Iterator for InMemorySource {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frames.pop_front()
  }
}

impl VideoSource for InMemorySource {
  fn fps(&self) -> Option<f64> {
    self.fps
  }

  fn dimensions(&self) -> Option<(u32, u32)> {
    self.frames.front().map(|frame| (frame.width(), frame.height()))
  }
}

/// 打开单张图片
pub fn open_image(path: impl AsRef<Path>) -> Result<ImageFileSource, SourceOpenError> {
  ImageFileSource::open(path.as_ref())
}

/// 打开视频文件，文件不存在时不创建任何管道
#[cfg(feature = "gstreamer")]
pub fn open_video(path: impl AsRef<Path>) -> Result<GStreamerInput, SourceOpenError> {
  let path = path.as_ref();
  ensure_file(path)?;
  GStreamerInput::open(path)
}

#[cfg(not(feature = "gstreamer"))]
pub fn open_video(path: impl AsRef<Path>) -> Result<InMemorySource, SourceOpenError> {
  let path = path.as_ref();
  ensure_file(path)?;
  Err(SourceOpenError::new(
    path,
    "未启用 gstreamer 特性，无法解码视频",
  ))
}

pub(crate) fn ensure_file(path: &Path) -> Result<(), SourceOpenError> {
  if !path.exists() {
    return Err(SourceOpenError::new(path, "文件不存在"));
  }
  if !path.is_file() {
    return Err(SourceOpenError::new(path, "不是普通文件"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn in_memory_source_numbers_frames() {
    let mut source = InMemorySource::from_images((0..3).map(|_| RgbImage::new(4, 2)), 20.0);
    assert_eq!(source.fps(), Some(20.0));
    assert_eq!(source.dimensions(), Some((4, 2)));

    let frames: Vec<Frame> = source.by_ref().collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].index, 2);
    assert_eq!(frames[2].timestamp_ms, 100);
    assert_eq!(source.remaining(), 0);
    assert_eq!(source.dimensions(), None);
  }

  #[test]
  fn missing_video_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nowhere.mp4");

    let err = open_video(&missing).err().unwrap();
    assert_eq!(err.path, missing);
    assert!(err.to_string().contains("nowhere.mp4"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  #[test]
  fn directory_is_not_a_source() {
    let dir = tempfile::tempdir().unwrap();
    let err = open_image(dir.path()).err().unwrap();
    assert_eq!(err.reason, "不是普通文件");
  }
}
