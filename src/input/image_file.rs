// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/input/image_file.rs - 图片文件输入源
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

use std::path::Path;

use image::{ImageFormat, ImageReader};
use tracing::debug;

use super::{VideoSource, ensure_file};
use crate::{error::SourceOpenError, frame::Frame};

/// 单张图片，产出一帧
pub struct ImageFileSource {
  frame: Option<Frame>,
  format: Option<ImageFormat>,
  width: u32,
  height: u32,
}

impl ImageFileSource {
  pub fn open(path: &Path) -> Result<Self, SourceOpenError> {
    ensure_file(path)?;

    let reader = ImageReader::open(path)
      .map_err(|e| SourceOpenError::new(path, format!("无法打开图片文件: {}", e)))?
      .with_guessed_format()
      .map_err(|e| SourceOpenError::new(path, format!("无法识别图片格式: {}", e)))?;
    let format = reader.format();
    let image = reader
      .decode()
      .map_err(|e| SourceOpenError::new(path, format!("无法解码图片文件: {}", e)))?
      .to_rgb8();

    let (width, height) = image.dimensions();
    debug!("读取图片 {} ({}x{})", path.display(), width, height);

    Ok(Self {
      frame: Some(Frame::still(image)),
      format,
      width,
      height,
    })
  }

  /// 检测到的文件格式，保存结果时沿用
  pub fn format(&self) -> Option<ImageFormat> {
    self.format
  }
}

impl Iterator for ImageFileSource {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

impl VideoSource for ImageFileSource {
  fn dimensions(&self) -> Option<(u32, u32)> {
    Some((self.width, self.height))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn yields_exactly_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    let mut image = RgbImage::new(3, 2);
    image.put_pixel(2, 1, Rgb([10, 20, 30]));
    image.save(&path).unwrap();

    let mut source = ImageFileSource::open(&path).unwrap();
    assert_eq!(source.format(), Some(ImageFormat::Png));
    assert_eq!(source.dimensions(), Some((3, 2)));

    let frame = source.next().unwrap();
    assert_eq!(frame.index, 0);
    assert_eq!(frame.image.get_pixel(2, 1), &Rgb([10, 20, 30]));
    assert!(source.next().is_none());
  }

  #[test]
  fn undecodable_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"not an image").unwrap();

    let err = ImageFileSource::open(&path).err().unwrap();
    assert_eq!(err.path, path);
    assert!(err.listing.contains(&"broken.jpg".to_string()));
  }
}
