// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// tests/common/mod.rs - 测试用推理器与输入
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

#![allow(dead_code)]

use gaitcheck::{
  DetectItem, DetectionSet, Frame, InferenceError, ModelProfile, Predictor, profile,
  input::InMemorySource,
  model::{PanopticSegmentation, SegmentInfo},
};
use image::{Rgb, RgbImage};

/// 按帧索引（从 0 开始）返回预设的标签
pub struct ScriptedPredictor {
  profile: ModelProfile,
  script: Vec<(u64, &'static str)>,
  pub calls: u64,
}

impl ScriptedPredictor {
  pub fn new(script: &[(u64, &'static str)]) -> Self {
    Self {
      profile: profile::select("OD").unwrap(),
      script: script.to_vec(),
      calls: 0,
    }
  }

  pub fn person_at(index: u64) -> Self {
    Self::new(&[(index, "person")])
  }
}

impl Predictor for ScriptedPredictor {
  fn profile(&self) -> &ModelProfile {
    &self.profile
  }

  fn infer(&mut self, frame: &Frame) -> Result<DetectionSet, InferenceError> {
    self.calls += 1;
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    let items = self
      .script
      .iter()
      .filter(|(index, _)| *index == frame.index)
      .map(|(_, label)| DetectItem::new(0, *label, 0.93, [w * 0.25, h * 0.25, w * 0.75, h * 0.75]))
      .collect();
    Ok(DetectionSet::new(items))
  }
}

/// 只输出全景分割图：指定帧整幅为 `person`，其余帧为 `road`
pub struct PanopticPredictor {
  profile: ModelProfile,
  person_at: u64,
}

impl PanopticPredictor {
  pub fn person_at(index: u64) -> Self {
    Self {
      profile: profile::select("PS").unwrap(),
      person_at: index,
    }
  }
}

impl Predictor for PanopticPredictor {
  fn profile(&self) -> &ModelProfile {
    &self.profile
  }

  fn infer(&mut self, frame: &Frame) -> Result<DetectionSet, InferenceError> {
    let person = frame.index == self.person_at;
    let segment = if person {
      SegmentInfo {
        id: 1,
        category_id: 0,
        is_thing: true,
        label: "person".to_string(),
      }
    } else {
      SegmentInfo {
        id: 2,
        category_id: 21,
        is_thing: false,
        label: "road".to_string(),
      }
    };
    let pixels = (frame.width() * frame.height()) as usize;
    Ok(DetectionSet::default().with_panoptic(PanopticSegmentation {
      width: frame.width(),
      height: frame.height(),
      segment_ids: vec![segment.id; pixels].into_boxed_slice(),
      segments: vec![segment],
    }))
  }
}

pub fn synthetic_frames(count: usize) -> InMemorySource {
  InMemorySource::from_images(
    (0..count).map(|i| RgbImage::from_pixel(32, 24, Rgb([(i * 20) as u8, 80, 160]))),
    20.0,
  )
}

pub fn jpeg_count(dir: &std::path::Path) -> usize {
  let Ok(entries) = std::fs::read_dir(dir) else {
    return 0;
  };
  entries
    .filter_map(|entry| entry.ok())
    .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "jpg"))
    .count()
}
