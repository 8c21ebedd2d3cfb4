// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理器
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

//! # ONNX 推理器
//!
//! 加载 model zoo 权重导出的 ONNX 模型（`<model_dir>/<配置名>.onnx`）。
//!
//! ## 输入
//!
//! - `image`: `f32 [3, H, W]`，BGR 通道顺序，取值 0..255
//!
//! ## 输出
//!
//! | 名称                   | 形状                           | 任务                 |
//! |------------------------|--------------------------------|----------------------|
//! | `boxes`                | `f32 [N, 4]`                   | 全部（全景可缺省）   |
//! | `scores`               | `f32 [N]`                      | 全部（全景可缺省）   |
//! | `classes`              | `i64 [N]`                      | 全部（全景可缺省）   |
//! | `masks`                | `f32 [N, 1, M, M]` / `[N, H, W]` | 实例分割           |
//! | `keypoints`            | `f32 [N, K, 3]`                | 关键点               |
//! | `panoptic_seg`         | `i32/i64 [H, W]`               | 全景分割             |
//! | `segment_ids`          | `i64 [S]`                      | 全景分割             |
//! | `segment_category_ids` | `i64 [S]`                      | 全景分割             |
//! | `segment_isthing`      | `i64 [S]`                      | 全景分割             |
//!
//! `M x M` 的掩码按检测框贴回原图，概率阈值 0.5。

use std::path::{Path, PathBuf};

use ndarray::{Array3, ArrayD, Axis};
use ort::{
  execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider},
  session::{Session, builder::GraphOptimizationLevel},
  value::{DynValue, Tensor},
};
use tracing::{debug, info, warn};

use crate::{
  config::Device,
  error::{ConfigurationError, InferenceError},
  frame::Frame,
  label::Vocabulary,
  model::{
    DetectItem, DetectionSet, Keypoint, Mask, PanopticSegmentation, Predictor, SegmentInfo,
    ensure_frame,
  },
  profile::ModelProfile,
};

const INPUT_NAME: &str = "image";
const MASK_THRESHOLD: f32 = 0.5;

impl From<ort::Error> for InferenceError {
  fn from(err: ort::Error) -> Self {
    InferenceError::Backend(err.to_string())
  }
}

impl From<ort::Error> for ConfigurationError {
  fn from(err: ort::Error) -> Self {
    ConfigurationError::Backend(err.to_string())
  }
}

pub struct OnnxPredictorBuilder {
  profile: ModelProfile,
  model_dir: PathBuf,
  device: Device,
  threads: Option<usize>,
}

impl OnnxPredictorBuilder {
  pub fn new(profile: ModelProfile) -> Self {
    Self {
      profile,
      model_dir: PathBuf::from("models"),
      device: Device::Auto,
      threads: None,
    }
  }

  pub fn model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
    self.model_dir = model_dir.into();
    self
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = Some(threads);
    self
  }

  pub fn model_path(&self) -> PathBuf {
    model_file(&self.profile, &self.model_dir)
  }

  pub fn build(self) -> Result<OnnxPredictor, ConfigurationError> {
    let model_path = self.model_path();
    if !model_path.is_file() {
      return Err(ConfigurationError::ModelFileMissing {
        path: model_path,
        weights: self.profile.weight_source.to_string(),
      });
    }

    let vocabulary = Vocabulary::load(&self.profile, &self.model_dir)?;
    let device = resolve_device(self.device)?;

    info!(
      "加载模型 {} ({}), 设备: {}",
      self.profile.model_type,
      model_path.display(),
      device
    );

    let builder = Session::builder()?;
    let builder = match device {
      Device::Cuda => {
        builder.with_execution_providers([CUDAExecutionProvider::default().build()])?
      }
      _ => builder.with_execution_providers([CPUExecutionProvider::default().build()])?,
    };
    let builder = builder.with_optimization_level(GraphOptimizationLevel::Level3)?;
    let builder = match self.threads {
      Some(threads) => builder.with_intra_threads(threads)?,
      None => builder,
    };
    let session = builder.commit_from_file(&model_path)?;
    info!("模型加载完成");

    Ok(OnnxPredictor {
      session,
      profile: self.profile,
      vocabulary,
      device,
    })
  }
}

pub fn model_file(profile: &ModelProfile, model_dir: &Path) -> PathBuf {
  model_dir.join(format!("{}.onnx", profile.config_stem()))
}

/// 启动时解析一次推理设备
fn resolve_device(device: Device) -> Result<Device, ConfigurationError> {
  match device {
    Device::Cpu => Ok(Device::Cpu),
    Device::Cuda => {
      if !CUDAExecutionProvider::default().is_available()? {
        return Err(ConfigurationError::Backend(
          "CUDA 执行器不可用".to_string(),
        ));
      }
      Ok(Device::Cuda)
    }
    Device::Auto => {
      if CUDAExecutionProvider::default().is_available().unwrap_or(false) {
        Ok(Device::Cuda)
      } else {
        warn!("CUDA 不可用，退回 CPU 推理");
        Ok(Device::Cpu)
      }
    }
  }
}

pub struct OnnxPredictor {
  session: Session,
  profile: ModelProfile,
  vocabulary: Vocabulary,
  device: Device,
}

impl OnnxPredictor {
  pub fn builder(profile: ModelProfile) -> OnnxPredictorBuilder {
    OnnxPredictorBuilder::new(profile)
  }

  /// 实际使用的设备
  pub fn device(&self) -> Device {
    self.device
  }
}

impl Predictor for OnnxPredictor {
  fn profile(&self) -> &ModelProfile {
    &self.profile
  }

  fn infer(&mut self, frame: &Frame) -> Result<DetectionSet, InferenceError> {
    ensure_frame(frame)?;

    let (width, height) = (frame.width(), frame.height());
    let input = Array3::from_shape_vec(
      (3, height as usize, width as usize),
      frame.to_bgr_chw(),
    )
    .map_err(|e| InferenceError::Backend(e.to_string()))?;
    let input = Tensor::from_array(input)?;

    let outputs = self.session.run(ort::inputs![INPUT_NAME => input])?;
    let raw = RawOutputs::collect(|name| outputs.get(name))?;
    drop(outputs);

    let decoder = Decoder {
      raw: &raw,
      profile: &self.profile,
      vocabulary: &self.vocabulary,
      width,
      height,
    };
    let mut result = DetectionSet::new(decoder.instances()?);
    if self.profile.task_kind.is_panoptic() {
      result = result.with_panoptic(decoder.panoptic()?);
    }
    debug!("帧 {}: {} 个检测", frame.index, result.len());
    Ok(result)
  }
}

/// 从会话输出中复制出的张量
#[derive(Default)]
struct RawOutputs {
  boxes: Option<ArrayD<f32>>,
  scores: Option<ArrayD<f32>>,
  classes: Option<Vec<i64>>,
  masks: Option<ArrayD<f32>>,
  keypoints: Option<ArrayD<f32>>,
  panoptic_seg: Option<Vec<i64>>,
  segment_ids: Option<Vec<i64>>,
  segment_category_ids: Option<Vec<i64>>,
  segment_isthing: Option<Vec<i64>>,
}

impl RawOutputs {
  fn collect<'v>(get: impl Fn(&str) -> Option<&'v DynValue>) -> Result<Self, InferenceError> {
    let floats = |name: &str| -> Result<Option<ArrayD<f32>>, InferenceError> {
      match get(name) {
        Some(value) => Ok(Some(value.try_extract_array::<f32>()?.to_owned())),
        None => Ok(None),
      }
    };
    let ints = |name: &str| -> Result<Option<Vec<i64>>, InferenceError> {
      let Some(value) = get(name) else {
        return Ok(None);
      };
      if let Ok(array) = value.try_extract_array::<i64>() {
        return Ok(Some(array.iter().copied().collect()));
      }
      let array = value.try_extract_array::<i32>()?;
      Ok(Some(array.iter().map(|v| *v as i64).collect()))
    };

    Ok(Self {
      boxes: floats("boxes")?,
      scores: floats("scores")?,
      classes: ints("classes")?,
      masks: floats("masks")?,
      keypoints: floats("keypoints")?,
      panoptic_seg: ints("panoptic_seg")?,
      segment_ids: ints("segment_ids")?,
      segment_category_ids: ints("segment_category_ids")?,
      segment_isthing: ints("segment_isthing")?,
    })
  }
}

struct Decoder<'a> {
  raw: &'a RawOutputs,
  profile: &'a ModelProfile,
  vocabulary: &'a Vocabulary,
  width: u32,
  height: u32,
}

fn required<'a, T>(value: &'a Option<T>, name: &'static str) -> Result<&'a T, InferenceError> {
  value.as_ref().ok_or(InferenceError::MissingOutput(name))
}

impl Decoder<'_> {
  fn instances(&self) -> Result<Vec<DetectItem>, InferenceError> {
    // 全景模型可以只输出分割图
    if self.raw.boxes.is_none() && self.profile.task_kind.is_panoptic() {
      return Ok(Vec::new());
    }
    let boxes = required(&self.raw.boxes, "boxes")?;
    let scores = required(&self.raw.scores, "scores")?;
    let classes = required(&self.raw.classes, "classes")?;

    let count = scores.len();
    if boxes.shape() != [count, 4] {
      return Err(InferenceError::ShapeMismatch {
        name: "boxes",
        shape: boxes.shape().to_vec(),
      });
    }
    if classes.len() != count {
      return Err(InferenceError::ShapeMismatch {
        name: "classes",
        shape: vec![classes.len()],
      });
    }

    let masks = if self.profile.task_kind.has_masks() {
      Some(required(&self.raw.masks, "masks")?)
    } else {
      None
    };
    let keypoints = if self.profile.task_kind.has_keypoints() {
      Some(required(&self.raw.keypoints, "keypoints")?)
    } else {
      None
    };

    let mut items = Vec::new();
    for (i, score) in scores.iter().copied().enumerate() {
      if score < self.profile.score_threshold {
        continue;
      }
      let class_id = classes[i];
      let label = self.vocabulary.thing(class_id)?;
      let bbox = [
        boxes[[i, 0]],
        boxes[[i, 1]],
        boxes[[i, 2]],
        boxes[[i, 3]],
      ];
      let mut item = DetectItem::new(class_id as u32, label, score, bbox);

      if let Some(masks) = masks {
        item = item.with_mask(self.paste_mask(masks, i, &bbox)?);
      }
      if let Some(keypoints) = keypoints {
        item = item.with_keypoints(read_keypoints(keypoints, i)?);
      }
      items.push(item);
    }
    Ok(items)
  }

  /// 掩码与帧同尺寸时直接使用，否则按检测框缩放贴回
  fn paste_mask(
    &self,
    masks: &ArrayD<f32>,
    index: usize,
    bbox: &[f32; 4],
  ) -> Result<Mask, InferenceError> {
    let mask = match masks.ndim() {
      4 if masks.shape()[0] > index => masks
        .index_axis(Axis(0), index)
        .index_axis_move(Axis(0), 0),
      3 if masks.shape()[0] > index => masks.index_axis(Axis(0), index),
      _ => {
        return Err(InferenceError::ShapeMismatch {
          name: "masks",
          shape: masks.shape().to_vec(),
        });
      }
    };
    let (mask_h, mask_w) = (mask.shape()[0], mask.shape()[1]);
    if mask_h == 0 || mask_w == 0 {
      return Err(InferenceError::ShapeMismatch {
        name: "masks",
        shape: masks.shape().to_vec(),
      });
    }

    if mask_h == self.height as usize && mask_w == self.width as usize {
      return Ok(Mask::from_fn(self.width, self.height, |x, y| {
        mask[[y as usize, x as usize]] >= MASK_THRESHOLD
      }));
    }

    let [x_min, y_min, x_max, y_max] = *bbox;
    let box_w = (x_max - x_min).max(1.0);
    let box_h = (y_max - y_min).max(1.0);
    Ok(Mask::from_fn(self.width, self.height, |x, y| {
      let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
      if px < x_min || px >= x_max || py < y_min || py >= y_max {
        return false;
      }
      let mx = (((px - x_min) / box_w) * mask_w as f32) as usize;
      let my = (((py - y_min) / box_h) * mask_h as f32) as usize;
      mask[[my.min(mask_h - 1), mx.min(mask_w - 1)]] >= MASK_THRESHOLD
    }))
  }

  fn panoptic(&self) -> Result<PanopticSegmentation, InferenceError> {
    let seg = required(&self.raw.panoptic_seg, "panoptic_seg")?;
    let expected = self.width as usize * self.height as usize;
    if seg.len() != expected {
      return Err(InferenceError::ShapeMismatch {
        name: "panoptic_seg",
        shape: vec![seg.len()],
      });
    }

    let ids = required(&self.raw.segment_ids, "segment_ids")?;
    let categories = required(&self.raw.segment_category_ids, "segment_category_ids")?;
    let is_thing = required(&self.raw.segment_isthing, "segment_isthing")?;
    if categories.len() != ids.len() || is_thing.len() != ids.len() {
      return Err(InferenceError::ShapeMismatch {
        name: "segment_category_ids",
        shape: vec![ids.len(), categories.len(), is_thing.len()],
      });
    }

    let mut segments = Vec::with_capacity(ids.len());
    for ((id, category), thing) in ids.iter().zip(categories).zip(is_thing) {
      let is_thing = *thing != 0;
      let label = if is_thing {
        self.vocabulary.thing(*category)?
      } else {
        self.vocabulary.stuff(*category)?
      };
      segments.push(SegmentInfo {
        id: *id as i32,
        category_id: *category as u32,
        is_thing,
        label: label.to_string(),
      });
    }

    Ok(PanopticSegmentation {
      width: self.width,
      height: self.height,
      segment_ids: seg.iter().map(|v| *v as i32).collect(),
      segments,
    })
  }
}

fn read_keypoints(keypoints: &ArrayD<f32>, index: usize) -> Result<Vec<Keypoint>, InferenceError> {
  let shape = keypoints.shape();
  if shape.len() != 3 || shape[2] < 3 || shape[0] <= index {
    return Err(InferenceError::ShapeMismatch {
      name: "keypoints",
      shape: shape.to_vec(),
    });
  }
  Ok(
    (0..shape[1])
      .map(|k| Keypoint {
        x: keypoints[[index, k, 0]],
        y: keypoints[[index, k, 1]],
        score: keypoints[[index, k, 2]],
      })
      .collect(),
  )
}
