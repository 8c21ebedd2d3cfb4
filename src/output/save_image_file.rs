// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::info;

use crate::{
  error::SinkWriteError,
  frame::Frame,
  model::DetectionSet,
  output::{Render, draw::Draw},
};

pub struct SaveImageFileOutput {
  path: PathBuf,
  format: Option<ImageFormat>,
  draw: Draw,
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>, draw: Draw) -> Self {
    Self {
      path: path.into(),
      format: None,
      draw,
    }
  }

  /// 指定编码格式，默认由扩展名推断
  pub fn with_format(mut self, format: Option<ImageFormat>) -> Self {
    self.format = format;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// 写入图像，必要时创建父目录
pub(crate) fn save_image(
  image: &RgbImage,
  path: &Path,
  format: Option<ImageFormat>,
) -> Result<(), SinkWriteError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(|source| SinkWriteError::CreateDir {
      path: parent.to_path_buf(),
      source,
    })?;
  }

  let encoded = match format {
    Some(format) => image.save_with_format(path, format),
    None => image.save(path),
  };
  encoded.map_err(|source| SinkWriteError::Encode {
    path: path.to_path_buf(),
    source,
  })
}

impl Render for SaveImageFileOutput {
  fn render_result(&mut self, frame: &Frame, result: &DetectionSet) -> Result<(), SinkWriteError> {
    let image = self.draw.annotate(&frame.image, result);
    save_image(&image, &self.path, self.format)?;
    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::draw::ColorMode;

  #[test]
  fn creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out/result.png");
    let mut output = SaveImageFileOutput::new(&path, Draw::new(ColorMode::Image, None));

    let frame = Frame::still(RgbImage::new(8, 8));
    output
      .render_result(&frame, &DetectionSet::default())
      .unwrap();

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (8, 8));
  }

  #[test]
  fn unknown_extension_is_an_encode_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut output = SaveImageFileOutput::new(
      dir.path().join("result.unknown"),
      Draw::new(ColorMode::Image, None),
    );

    let frame = Frame::still(RgbImage::new(2, 2));
    assert!(matches!(
      output.render_result(&frame, &DetectionSet::default()),
      Err(SinkWriteError::Encode { .. })
    ));
  }
}
