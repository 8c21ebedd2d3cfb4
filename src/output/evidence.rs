// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/output/evidence.rs - 验证证据帧
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

use image::ImageFormat;
use tracing::info;

use super::{draw::Draw, save_image_file::save_image};
use crate::{error::SinkWriteError, frame::Frame, model::DetectionSet};

/// 保存触发验证通过的那一帧
pub trait EvidenceSink {
  /// 写入标注后的帧，返回文件路径
  fn persist(&mut self, frame: &Frame, result: &DetectionSet) -> Result<PathBuf, SinkWriteError>;
}

impl<S: EvidenceSink + ?Sized> EvidenceSink for &mut S {
  fn persist(&mut self, frame: &Frame, result: &DetectionSet) -> Result<PathBuf, SinkWriteError> {
    (**self).persist(frame, result)
  }
}

/// `frame_<n>.jpg`，`n` 从 1 开始
pub fn evidence_file_name(frame: &Frame) -> String {
  format!("frame_{}.jpg", frame.number())
}

/// 把证据帧写入目录，目录在第一次写入时创建
pub struct EvidenceDirectory {
  root: PathBuf,
  draw: Draw,
}

impl EvidenceDirectory {
  pub fn new(root: impl Into<PathBuf>, draw: Draw) -> Self {
    Self {
      root: root.into(),
      draw,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

impl EvidenceSink for EvidenceDirectory {
  fn persist(&mut self, frame: &Frame, result: &DetectionSet) -> Result<PathBuf, SinkWriteError> {
    std::fs::create_dir_all(&self.root).map_err(|source| SinkWriteError::CreateDir {
      path: self.root.clone(),
      source,
    })?;

    let path = self.root.join(evidence_file_name(frame));
    let image = self.draw.annotate(&frame.image, result);
    save_image(&image, &path, Some(ImageFormat::Jpeg))?;
    info!("证据帧已保存: {}", path.display());
    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::draw::ColorMode;
  use image::RgbImage;

  #[test]
  fn directory_is_created_on_first_write() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("evidence");
    let mut sink = EvidenceDirectory::new(&root, Draw::new(ColorMode::Image, None));
    assert!(!root.exists());

    let frame = Frame::new(RgbImage::new(6, 4), 6, 300);
    let path = sink.persist(&frame, &DetectionSet::default()).unwrap();

    assert_eq!(path, root.join("frame_7.jpg"));
    assert_eq!(
      image::ImageFormat::from_path(&path).unwrap(),
      ImageFormat::Jpeg
    );
    assert!(image::open(&path).is_ok());
  }
}
