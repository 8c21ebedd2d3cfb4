// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/profile.rs - 模型配置表
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

//! # 模型配置
//!
//! 每个模型类型对应一组固定的（网络配置, 预训练权重, 置信度阈值）。
//! 选择过程是一次查表，未知的类型直接返回 [`ConfigurationError`]。
//!
//! ```
//! use gaitcheck::profile::{self, TaskKind};
//!
//! let profile = profile::select("KP").unwrap();
//! assert_eq!(profile.task_kind, TaskKind::KeypointDetection);
//! assert!(profile::select("YOLO").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigurationError;

/// 所有配置共用的置信度阈值
pub const SCORE_THRESHOLD: f32 = 0.7;

macro_rules! zoo_url {
  ($path:literal) => {
    concat!("https://dl.fbaipublicfiles.com/detectron2/", $path)
  };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelType {
  #[serde(rename = "OD")]
  ObjectDetection,
  #[serde(rename = "IS")]
  InstanceSegmentation,
  #[serde(rename = "KP")]
  KeypointDetection,
  #[serde(rename = "LVIS")]
  LvisInstanceSegmentation,
  #[serde(rename = "PS")]
  PanopticSegmentation,
}

impl ModelType {
  pub fn token(&self) -> &'static str {
    match self {
      ModelType::ObjectDetection => "OD",
      ModelType::InstanceSegmentation => "IS",
      ModelType::KeypointDetection => "KP",
      ModelType::LvisInstanceSegmentation => "LVIS",
      ModelType::PanopticSegmentation => "PS",
    }
  }
}

impl fmt::Display for ModelType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.token())
  }
}

impl FromStr for ModelType {
  type Err = ConfigurationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    PROFILES
      .iter()
      .map(|profile| profile.model_type)
      .find(|model_type| model_type.token() == s)
      .ok_or_else(|| ConfigurationError::UnknownModelType(s.to_string()))
  }
}

/// 推理任务类型，决定如何解读预测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskKind {
  ObjectDetection,
  InstanceSegmentation,
  KeypointDetection,
  PanopticSegmentation,
}

impl TaskKind {
  pub fn has_masks(&self) -> bool {
    matches!(self, TaskKind::InstanceSegmentation)
  }

  pub fn has_keypoints(&self) -> bool {
    matches!(self, TaskKind::KeypointDetection)
  }

  pub fn is_panoptic(&self) -> bool {
    matches!(self, TaskKind::PanopticSegmentation)
  }
}

/// 训练数据集，决定类别标签表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dataset {
  Coco,
  Lvis,
  CocoPanoptic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelProfile {
  pub model_type: ModelType,
  pub task_kind: TaskKind,
  /// model zoo 中的网络配置路径
  pub config_source: &'static str,
  /// 预训练权重下载地址
  pub weight_source: &'static str,
  pub score_threshold: f32,
  pub dataset: Dataset,
}

impl ModelProfile {
  /// 配置文件名去掉目录与扩展名，用于查找导出的模型文件
  pub fn config_stem(&self) -> &'static str {
    let name = self
      .config_source
      .rsplit_once('/')
      .map(|(_, name)| name)
      .unwrap_or(self.config_source);
    name.strip_suffix(".yaml").unwrap_or(name)
  }
}

pub static PROFILES: [ModelProfile; 5] = [
  ModelProfile {
    model_type: ModelType::ObjectDetection,
    task_kind: TaskKind::ObjectDetection,
    config_source: "COCO-Detection/faster_rcnn_R_101_FPN_3x.yaml",
    weight_source: zoo_url!(
      "COCO-Detection/faster_rcnn_R_101_FPN_3x/137851257/model_final_f6e8b1.pkl"
    ),
    score_threshold: SCORE_THRESHOLD,
    dataset: Dataset::Coco,
  },
  ModelProfile {
    model_type: ModelType::InstanceSegmentation,
    task_kind: TaskKind::InstanceSegmentation,
    config_source: "COCO-InstanceSegmentation/mask_rcnn_R_50_FPN_3x.yaml",
    weight_source: zoo_url!(
      "COCO-InstanceSegmentation/mask_rcnn_R_50_FPN_3x/137849600/model_final_f10217.pkl"
    ),
    score_threshold: SCORE_THRESHOLD,
    dataset: Dataset::Coco,
  },
  ModelProfile {
    model_type: ModelType::KeypointDetection,
    task_kind: TaskKind::KeypointDetection,
    config_source: "COCO-Keypoints/keypoint_rcnn_R_50_FPN_3x.yaml",
    weight_source: zoo_url!(
      "COCO-Keypoints/keypoint_rcnn_R_50_FPN_3x/137849621/model_final_a6e10b.pkl"
    ),
    score_threshold: SCORE_THRESHOLD,
    dataset: Dataset::Coco,
  },
  ModelProfile {
    model_type: ModelType::LvisInstanceSegmentation,
    task_kind: TaskKind::InstanceSegmentation,
    config_source: "LVISv0.5-InstanceSegmentation/mask_rcnn_X_101_32x8d_FPN_1x.yaml",
    weight_source: zoo_url!(
      "LVISv0.5-InstanceSegmentation/mask_rcnn_X_101_32x8d_FPN_1x/144219108/model_final_5e3439.pkl"
    ),
    score_threshold: SCORE_THRESHOLD,
    dataset: Dataset::Lvis,
  },
  ModelProfile {
    model_type: ModelType::PanopticSegmentation,
    task_kind: TaskKind::PanopticSegmentation,
    config_source: "COCO-PanopticSegmentation/panoptic_fpn_R_101_3x.yaml",
    weight_source: zoo_url!(
      "COCO-PanopticSegmentation/panoptic_fpn_R_101_3x/139514519/model_final_cafdb1.pkl"
    ),
    score_threshold: SCORE_THRESHOLD,
    dataset: Dataset::CocoPanoptic,
  },
];

/// 完整的配置表
pub fn profiles() -> &'static [ModelProfile] {
  &PROFILES
}

/// 按模型类型标记选择配置
pub fn select(token: &str) -> Result<ModelProfile, ConfigurationError> {
  let model_type = ModelType::from_str(token)?;
  Ok(by_model_type(model_type))
}

pub fn by_model_type(model_type: ModelType) -> ModelProfile {
  PROFILES
    .iter()
    .copied()
    .find(|profile| profile.model_type == model_type)
    .unwrap_or_else(|| unreachable!("每个模型类型在配置表中都有一项"))
}

#[cfg(test)]
mod tests {
  use super::*;

  const MODEL_ZOO_URL: &str = "https://dl.fbaipublicfiles.com/detectron2";

  #[test]
  fn every_token_maps_to_its_task() {
    let expected = [
      ("OD", TaskKind::ObjectDetection),
      ("IS", TaskKind::InstanceSegmentation),
      ("KP", TaskKind::KeypointDetection),
      ("LVIS", TaskKind::InstanceSegmentation),
      ("PS", TaskKind::PanopticSegmentation),
    ];

    for (token, task_kind) in expected {
      let profile = select(token).unwrap();
      assert_eq!(profile.task_kind, task_kind, "{}", token);
      assert_eq!(profile.score_threshold, 0.7);
      assert_eq!(profile.model_type.token(), token);
      assert!(profile.weight_source.starts_with(MODEL_ZOO_URL));
      assert!(profile.weight_source.ends_with(".pkl"));
    }
  }

  #[test]
  fn unknown_token_is_a_configuration_error() {
    for token in ["", "od", "YOLO", "PS "] {
      let err = select(token).unwrap_err();
      assert!(matches!(err, ConfigurationError::UnknownModelType(ref t) if t == token));
    }
  }

  #[test]
  fn lvis_uses_its_own_vocabulary() {
    assert_eq!(select("LVIS").unwrap().dataset, Dataset::Lvis);
    assert_eq!(select("IS").unwrap().dataset, Dataset::Coco);
    assert_eq!(select("PS").unwrap().dataset, Dataset::CocoPanoptic);
  }

  #[test]
  fn config_stem_strips_directory_and_extension() {
    assert_eq!(
      select("OD").unwrap().config_stem(),
      "faster_rcnn_R_101_FPN_3x"
    );
    assert_eq!(
      select("LVIS").unwrap().config_stem(),
      "mask_rcnn_X_101_32x8d_FPN_1x"
    );
  }

  #[test]
  fn weight_source_matches_config() {
    for profile in profiles() {
      let config = profile.config_source.strip_suffix(".yaml").unwrap();
      assert!(profile.weight_source.contains(config));
    }
  }
}
