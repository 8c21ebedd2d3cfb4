// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// tests/image_job.rs - 图片任务测试
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

mod common;

use common::{ScriptedPredictor, synthetic_frames};
use gaitcheck::{
  Detector, DetectorConfig, Error, ScanEnd,
  output::{SaveImageFileOutput, draw::{ColorMode, Draw}},
};
use image::{ImageFormat, Rgb, RgbImage};

#[test]
fn image_job_writes_processed_file_next_to_input() {
  let dir = tempfile::tempdir().unwrap();
  let input = dir.path().join("photo.png");
  RgbImage::from_pixel(40, 30, Rgb([200, 200, 200]))
    .save(&input)
    .unwrap();

  let mut detector = Detector::new(ScriptedPredictor::person_at(0), DetectorConfig::default());
  let output = detector.on_image(&input).unwrap();

  assert_eq!(output, dir.path().join("photo_processed.png"));
  assert_eq!(ImageFormat::from_path(&output).unwrap(), ImageFormat::Png);
  let annotated = image::open(&output).unwrap().to_rgb8();
  assert_eq!(annotated.dimensions(), (40, 30));
  // 检测框 [10, 7.5, 30, 22.5] 的左边
  assert_ne!(annotated.get_pixel(10, 15), &Rgb([200, 200, 200]));
  assert_eq!(detector.predictor_mut().calls, 1);
}

#[test]
fn processing_a_processed_image_appends_the_suffix_again() {
  let dir = tempfile::tempdir().unwrap();
  let input = dir.path().join("photo_processed.jpg");
  RgbImage::new(16, 16).save(&input).unwrap();

  let mut detector = Detector::new(ScriptedPredictor::new(&[]), DetectorConfig::default());
  let output = detector.on_image(&input).unwrap();
  assert_eq!(output, dir.path().join("photo_processed_processed.jpg"));
  assert!(output.is_file());
}

#[test]
fn missing_image_creates_nothing() {
  let dir = tempfile::tempdir().unwrap();
  let mut detector = Detector::new(ScriptedPredictor::new(&[]), DetectorConfig::default());

  let result = detector.on_image(dir.path().join("absent.jpg"));
  assert!(matches!(result, Err(Error::SourceOpen(_))));
  assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn render_source_draws_every_frame() {
  let dir = tempfile::tempdir().unwrap();
  let target = dir.path().join("last.png");
  let mut detector = Detector::new(ScriptedPredictor::person_at(2), DetectorConfig::default());

  let output = SaveImageFileOutput::new(&target, Draw::new(ColorMode::Segmentation, None));
  let summary = detector.render_source(synthetic_frames(4), output).unwrap();

  assert_eq!(summary.frames_scanned, 4);
  assert_eq!(summary.end, ScanEnd::Exhausted);
  assert!(target.is_file());
  assert_eq!(detector.predictor_mut().calls, 4);
}
