// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/model.rs - 推理器与预测结果
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

use serde::Serialize;

use crate::{config::LabelMatch, error::InferenceError, frame::Frame, profile::ModelProfile};

/// 预训练模型推理器
///
/// 每个配置构建一次，在所有帧之间复用。`infer` 需要独占引用，
/// 同一个推理器不会被并发调用。返回的结果已经按配置的阈值过滤。
pub trait Predictor {
  fn profile(&self) -> &ModelProfile;

  fn infer(&mut self, frame: &Frame) -> Result<DetectionSet, InferenceError>;
}

impl<P: Predictor + ?Sized> Predictor for &mut P {
  fn profile(&self) -> &ModelProfile {
    (**self).profile()
  }

  fn infer(&mut self, frame: &Frame) -> Result<DetectionSet, InferenceError> {
    (**self).infer(frame)
  }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
  fn profile(&self) -> &ModelProfile {
    (**self).profile()
  }

  fn infer(&mut self, frame: &Frame) -> Result<DetectionSet, InferenceError> {
    (**self).infer(frame)
  }
}

/// 拒绝空帧
pub fn ensure_frame(frame: &Frame) -> Result<(), InferenceError> {
  if frame.is_empty() {
    return Err(InferenceError::EmptyFrame {
      width: frame.width(),
      height: frame.height(),
    });
  }
  Ok(())
}

/// 实例掩码，与帧同尺寸
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
  width: u32,
  height: u32,
  data: Box<[bool]>,
}

impl Mask {
  pub fn new(width: u32, height: u32, data: Vec<bool>) -> Option<Self> {
    if data.len() != width as usize * height as usize {
      return None;
    }
    Some(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
    let mut data = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
      for x in 0..width {
        data.push(f(x, y));
      }
    }
    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn get(&self, x: u32, y: u32) -> bool {
    x < self.width && y < self.height && self.data[(y * self.width + x) as usize]
  }

  pub fn area(&self) -> usize {
    self.data.iter().filter(|v| **v).count()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub score: f32,
}

#[derive(Debug, Clone)]
pub struct DetectItem {
  pub class_id: u32,
  pub label: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，像素坐标
  pub mask: Option<Mask>,
  pub keypoints: Option<Box<[Keypoint]>>,
}

impl DetectItem {
  pub fn new(class_id: u32, label: impl Into<String>, score: f32, bbox: [f32; 4]) -> Self {
    Self {
      class_id,
      label: label.into(),
      score,
      bbox,
      mask: None,
      keypoints: None,
    }
  }

  pub fn with_mask(mut self, mask: Mask) -> Self {
    self.mask = Some(mask);
    self
  }

  pub fn with_keypoints(mut self, keypoints: Vec<Keypoint>) -> Self {
    self.keypoints = Some(keypoints.into_boxed_slice());
    self
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
  pub id: i32,
  pub category_id: u32,
  pub is_thing: bool,
  pub label: String,
}

/// 全景分割结果：每个像素的区域编号，0 表示未归类
#[derive(Debug, Clone)]
pub struct PanopticSegmentation {
  pub width: u32,
  pub height: u32,
  pub segment_ids: Box<[i32]>,
  pub segments: Vec<SegmentInfo>,
}

impl PanopticSegmentation {
  pub fn segment_at(&self, x: u32, y: u32) -> Option<&SegmentInfo> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let id = self.segment_ids[(y * self.width + x) as usize];
    if id == 0 {
      return None;
    }
    self.segments.iter().find(|segment| segment.id == id)
  }
}

/// 单帧的预测结果
#[derive(Debug, Clone, Default)]
pub struct DetectionSet {
  pub items: Box<[DetectItem]>,
  pub panoptic: Option<PanopticSegmentation>,
}

impl DetectionSet {
  pub fn new(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
      panoptic: None,
    }
  }

  pub fn with_panoptic(mut self, panoptic: PanopticSegmentation) -> Self {
    self.panoptic = Some(panoptic);
    self
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 实例标签在前，全景区域标签在后
  pub fn labels(&self) -> impl Iterator<Item = &str> {
    let segments = self.panoptic.iter().flat_map(|panoptic| panoptic.segments.iter());
    self
      .items
      .iter()
      .map(|item| item.label.as_str())
      .chain(segments.map(|segment| segment.label.as_str()))
  }

  /// 第一个标签匹配 `target` 的检测。先找实例，再找全景区域
  pub fn find_label(&self, target: &str, policy: LabelMatch) -> Option<LabelHit<'_>> {
    if let Some(item) = self
      .items
      .iter()
      .find(|item| policy.matches(&item.label, target))
    {
      return Some(LabelHit::Instance(item));
    }
    self
      .panoptic
      .as_ref()?
      .segments
      .iter()
      .find(|segment| policy.matches(&segment.label, target))
      .map(LabelHit::Segment)
  }

  pub fn contains_label(&self, target: &str, policy: LabelMatch) -> bool {
    self.find_label(target, policy).is_some()
  }
}

/// 标签命中的来源
#[derive(Debug, Clone, Copy)]
pub enum LabelHit<'a> {
  Instance(&'a DetectItem),
  Segment(&'a SegmentInfo),
}

impl LabelHit<'_> {
  pub fn label(&self) -> &str {
    match self {
      LabelHit::Instance(item) => &item.label,
      LabelHit::Segment(segment) => &segment.label,
    }
  }

  pub fn class_id(&self) -> u32 {
    match self {
      LabelHit::Instance(item) => item.class_id,
      LabelHit::Segment(segment) => segment.category_id,
    }
  }

  /// 全景区域没有置信度
  pub fn score(&self) -> Option<f32> {
    match self {
      LabelHit::Instance(item) => Some(item.score),
      LabelHit::Segment(_) => None,
    }
  }
}

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxPredictor, OnnxPredictorBuilder};

#[cfg(test)]
mod tests {
  use super::*;

  fn set(labels: &[&str]) -> DetectionSet {
    DetectionSet::new(
      labels
        .iter()
        .enumerate()
        .map(|(i, label)| DetectItem::new(i as u32, *label, 0.9, [0.0, 0.0, 1.0, 1.0]))
        .collect(),
    )
  }

  #[test]
  fn label_lookup_respects_policy() {
    let detections = set(&["dog", "personal_computer"]);
    assert!(!detections.contains_label("person", LabelMatch::Exact));
    assert!(detections.contains_label("person", LabelMatch::Substring));

    let detections = set(&["dog", "person"]);
    assert_eq!(
      detections
        .find_label("person", LabelMatch::Exact)
        .map(|hit| hit.class_id()),
      Some(1)
    );
  }

  #[test]
  fn label_lookup_reaches_panoptic_segments() {
    let panoptic = PanopticSegmentation {
      width: 2,
      height: 1,
      segment_ids: vec![1, 2].into_boxed_slice(),
      segments: vec![
        SegmentInfo {
          id: 1,
          category_id: 0,
          is_thing: true,
          label: "person".to_string(),
        },
        SegmentInfo {
          id: 2,
          category_id: 21,
          is_thing: false,
          label: "road".to_string(),
        },
      ],
    };
    let detections = DetectionSet::default().with_panoptic(panoptic);
    assert!(detections.is_empty());

    let hit = detections.find_label("person", LabelMatch::Exact).unwrap();
    assert!(matches!(hit, LabelHit::Segment(segment) if segment.id == 1));
    assert_eq!(hit.score(), None);
    assert_eq!(detections.labels().collect::<Vec<_>>(), ["person", "road"]);

    let detections = set(&["person"]).with_panoptic(detections.panoptic.clone().unwrap());
    assert!(matches!(
      detections.find_label("person", LabelMatch::Exact),
      Some(LabelHit::Instance(_))
    ));
  }

  #[test]
  fn mask_rejects_wrong_length() {
    assert!(Mask::new(2, 2, vec![true; 3]).is_none());
    let mask = Mask::new(2, 2, vec![true, false, false, true]).unwrap();
    assert!(mask.get(1, 1));
    assert!(!mask.get(1, 0));
    assert!(!mask.get(5, 5));
    assert_eq!(mask.area(), 2);
  }

  #[test]
  fn panoptic_void_pixels_have_no_segment() {
    let panoptic = PanopticSegmentation {
      width: 2,
      height: 1,
      segment_ids: vec![0, 3].into_boxed_slice(),
      segments: vec![SegmentInfo {
        id: 3,
        category_id: 21,
        is_thing: false,
        label: "road".to_string(),
      }],
    };
    assert!(panoptic.segment_at(0, 0).is_none());
    assert_eq!(panoptic.segment_at(1, 0).unwrap().label, "road");
    assert!(panoptic.segment_at(2, 0).is_none());
  }

  #[test]
  fn empty_frame_is_rejected() {
    let frame = Frame::still(image::RgbImage::new(0, 0));
    assert!(matches!(
      ensure_frame(&frame),
      Err(InferenceError::EmptyFrame {
        width: 0,
        height: 0
      })
    ));
  }
}
