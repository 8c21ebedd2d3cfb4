// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/label.rs - 类别标签表
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

use tracing::{debug, info};

use crate::{
  error::{ConfigurationError, InferenceError},
  profile::{Dataset, ModelProfile},
};

pub const COCO_THING_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 全景分割的背景类别，第 0 项代表所有前景
pub const COCO_PANOPTIC_STUFF_CLASSES: [&str; 54] = [
  "things",
  "banner",
  "blanket",
  "bridge",
  "cardboard",
  "counter",
  "curtain",
  "door-stuff",
  "floor-wood",
  "flower",
  "fruit",
  "gravel",
  "house",
  "light",
  "mirror-stuff",
  "net",
  "pillow",
  "platform",
  "playingfield",
  "railroad",
  "river",
  "road",
  "roof",
  "sand",
  "sea",
  "shelf",
  "snow",
  "stairs",
  "tent",
  "towel",
  "wall-brick",
  "wall-stone",
  "wall-tile",
  "wall-wood",
  "water-other",
  "window-blind",
  "window-other",
  "tree-merged",
  "fence-merged",
  "ceiling-merged",
  "sky-other-merged",
  "cabinet-merged",
  "table-merged",
  "floor-other-merged",
  "pavement-merged",
  "mountain-merged",
  "grass-merged",
  "dirt-merged",
  "paper-merged",
  "food-other-merged",
  "building-other-merged",
  "rock-merged",
  "wall-other-merged",
  "rug-merged",
];

/// 标签文件后缀，与导出模型同名放置
pub const LABEL_FILE_SUFFIX: &str = ".labels.txt";

#[derive(Debug, Clone)]
pub struct Vocabulary {
  things: Vec<String>,
  stuff: Vec<String>,
}

impl Vocabulary {
  pub fn new(things: Vec<String>, stuff: Vec<String>) -> Self {
    Self { things, stuff }
  }

  pub fn coco() -> Self {
    Self::new(to_owned(&COCO_THING_CLASSES), Vec::new())
  }

  pub fn coco_panoptic() -> Self {
    Self::new(
      to_owned(&COCO_THING_CLASSES),
      to_owned(&COCO_PANOPTIC_STUFF_CLASSES),
    )
  }

  /// 内置标签表，LVIS 没有内置表
  pub fn builtin(dataset: Dataset) -> Option<Self> {
    match dataset {
      Dataset::Coco => Some(Self::coco()),
      Dataset::CocoPanoptic => Some(Self::coco_panoptic()),
      Dataset::Lvis => None,
    }
  }

  /// 读取每行一个类别名的标签文件，空行忽略
  pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Vocabulary {
      path: path.to_path_buf(),
      source,
    })?;
    let things: Vec<String> = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(String::from)
      .collect();
    debug!("从 {} 读取 {} 个类别", path.display(), things.len());
    Ok(Self::new(things, Vec::new()))
  }

  pub fn label_file(profile: &ModelProfile, model_dir: &Path) -> PathBuf {
    model_dir.join(format!("{}{}", profile.config_stem(), LABEL_FILE_SUFFIX))
  }

  /// 标签文件优先，其次是内置表
  pub fn load(profile: &ModelProfile, model_dir: &Path) -> Result<Self, ConfigurationError> {
    let path = Self::label_file(profile, model_dir);
    if path.is_file() {
      info!("使用标签文件: {}", path.display());
      let mut vocabulary = Self::from_file(&path)?;
      if profile.dataset == Dataset::CocoPanoptic {
        vocabulary.stuff = to_owned(&COCO_PANOPTIC_STUFF_CLASSES);
      }
      return Ok(vocabulary);
    }

    match Self::builtin(profile.dataset) {
      Some(vocabulary) => Ok(vocabulary),
      None => Err(ConfigurationError::Vocabulary {
        path,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "该数据集没有内置标签表"),
      }),
    }
  }

  pub fn thing(&self, id: i64) -> Result<&str, InferenceError> {
    lookup(&self.things, id)
  }

  pub fn stuff(&self, id: i64) -> Result<&str, InferenceError> {
    lookup(&self.stuff, id)
  }

  pub fn things(&self) -> &[String] {
    &self.things
  }

  pub fn len(&self) -> usize {
    self.things.len()
  }

  pub fn is_empty(&self) -> bool {
    self.things.is_empty()
  }
}

fn to_owned(names: &[&str]) -> Vec<String> {
  names.iter().map(|name| name.to_string()).collect()
}

fn lookup(names: &[String], id: i64) -> Result<&str, InferenceError> {
  usize::try_from(id)
    .ok()
    .and_then(|idx| names.get(idx))
    .map(String::as_str)
    .ok_or(InferenceError::UnknownClass {
      id,
      size: names.len(),
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::profile;

  #[test]
  fn coco_person_is_class_zero() {
    let vocabulary = Vocabulary::coco();
    assert_eq!(vocabulary.thing(0).unwrap(), "person");
    assert_eq!(vocabulary.thing(79).unwrap(), "toothbrush");
    assert!(matches!(
      vocabulary.thing(80),
      Err(InferenceError::UnknownClass { id: 80, size: 80 })
    ));
    assert!(vocabulary.thing(-1).is_err());
  }

  #[test]
  fn panoptic_has_stuff_classes() {
    let vocabulary = Vocabulary::coco_panoptic();
    assert_eq!(vocabulary.stuff(0).unwrap(), "things");
    assert_eq!(vocabulary.stuff(53).unwrap(), "rug-merged");
  }

  #[test]
  fn lvis_requires_label_file() {
    let dir = tempfile::tempdir().unwrap();
    let lvis = profile::select("LVIS").unwrap();
    assert!(matches!(
      Vocabulary::load(&lvis, dir.path()),
      Err(ConfigurationError::Vocabulary { .. })
    ));

    let path = Vocabulary::label_file(&lvis, dir.path());
    std::fs::write(&path, "aerosol_can\n\nair_conditioner\nperson\n").unwrap();
    let vocabulary = Vocabulary::load(&lvis, dir.path()).unwrap();
    assert_eq!(vocabulary.len(), 3);
    assert_eq!(vocabulary.thing(2).unwrap(), "person");
  }

  #[test]
  fn coco_profiles_fall_back_to_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let od = profile::select("OD").unwrap();
    assert_eq!(Vocabulary::load(&od, dir.path()).unwrap().len(), 80);
  }
}
