// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/output/draw.rs - 预测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
  draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
  draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::model::{DetectItem, DetectionSet, Keypoint, Mask, PanopticSegmentation};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const PALETTE_SIZE: usize = 80;
const STUFF_PALETTE_OFFSET: usize = 37;
const MASK_ALPHA: f32 = 0.5;
const PANOPTIC_ALPHA: f32 = 0.45;
const KEYPOINT_THRESHOLD: f32 = 0.05;
const KEYPOINT_RADIUS: i32 = 3;

/// COCO 人体关键点连线
pub const COCO_KEYPOINT_CONNECTIONS: [(usize, usize); 14] = [
  (3, 1),
  (4, 2),
  (1, 0),
  (0, 2),
  (5, 6),
  (5, 7),
  (6, 8),
  (7, 9),
  (8, 10),
  (11, 12),
  (11, 13),
  (12, 14),
  (13, 15),
  (14, 16),
];

/// 未指定字体时依次尝试的系统字体
const SYSTEM_FONTS: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/System/Library/Fonts/Helvetica.ttc",
  "C:\\Windows\\Fonts\\arial.ttf",
];

/// 配色方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
  /// 每个实例一种颜色，用于单张图片
  #[default]
  Image,
  /// 每个类别一种颜色，视频中颜色在帧间保持稳定
  Segmentation,
}

/// 加载字体：优先使用指定路径，否则查找系统字体
pub fn load_font(path: Option<&Path>) -> Option<FontArc> {
  let candidates: Vec<PathBuf> = match path {
    Some(path) => vec![path.to_path_buf()],
    None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
  };

  for candidate in candidates {
    let Ok(data) = std::fs::read(&candidate) else {
      continue;
    };
    match FontArc::try_from_vec(data) {
      Ok(font) => {
        debug!("使用字体: {}", candidate.display());
        return Some(font);
      }
      Err(e) => warn!("无法解析字体 {}: {}", candidate.display(), e),
    }
  }
  None
}

#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  font_scale: PxScale,
  mode: ColorMode,
  colors: Vec<Rgb<u8>>,
}

impl Draw {
  /// `font` 为 `None` 时只绘制图形，不绘制文字
  pub fn new(mode: ColorMode, font: Option<FontArc>) -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| {
        let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      mode,
      colors,
    }
  }

  pub fn with_mode(mut self, mode: ColorMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn mode(&self) -> ColorMode {
    self.mode
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 第 `index` 个检测的颜色
  pub fn item_color(&self, index: usize, item: &DetectItem) -> Rgb<u8> {
    let key = match self.mode {
      ColorMode::Image => index,
      ColorMode::Segmentation => item.class_id as usize,
    };
    self.colors[key % self.colors.len()]
  }

  /// 返回绘制了结果的新图像
  pub fn annotate(&self, image: &RgbImage, result: &DetectionSet) -> RgbImage {
    let mut canvas = image.clone();
    self.draw_detections(&mut canvas, result);
    canvas
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectionSet) {
    if let Some(panoptic) = &result.panoptic {
      self.draw_panoptic(image, panoptic);
    }

    for (index, item) in result.items.iter().enumerate() {
      let color = self.item_color(index, item);
      if let Some(mask) = &item.mask {
        blend_mask(image, mask, color, MASK_ALPHA);
      }
      self.draw_bbox(image, &item.bbox, color);
      if let Some(keypoints) = &item.keypoints {
        draw_keypoints(image, keypoints, color);
      }
      let label = format!("{} {:.0}%", item.label, item.score * 100.0);
      self.draw_label(image, item.bbox[0] as i32, item.bbox[1] as i32, &label, color);
    }
  }

  fn draw_bbox(&self, image: &mut RgbImage, bbox: &[f32; 4], color: Rgb<u8>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 加粗为 2 像素
    for thickness in 0..2 {
      let width = (x_max - x_min + 1 - 2 * thickness).max(0) as u32;
      let height = (y_max - y_min + 1 - 2 * thickness).max(0) as u32;
      if width == 0 || height == 0 {
        break;
      }
      let rect = Rect::at(x_min + thickness, y_min + thickness).of_size(width, height);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  /// 标签放在 `(x, y)` 上方，放不下时放在内侧
  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, label: &str, color: Rgb<u8>) {
    let Some(font) = &self.font else {
      return;
    };

    let (text_w, text_h) = text_size(self.font_scale, font, label);
    let box_h = text_h as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;
    let label_x = x.clamp(0, (image.width() as i32 - 1).max(0));
    let label_y = if y - box_h >= 0 { y - box_h } else { y.max(0) };

    let max_width = (image.width() as i32 - label_x).max(0) as u32;
    let box_w = (text_w + 4).min(max_width);
    if box_w == 0 || box_h <= 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(box_w, box_h as u32);
    draw_filled_rect_mut(image, rect, color);
    draw_text_mut(
      image,
      TEXT_COLOR,
      label_x + 2,
      label_y + LABEL_TEXT_VERTICAL_PADDING,
      self.font_scale,
      font,
      label,
    );
  }

  fn draw_panoptic(&self, image: &mut RgbImage, panoptic: &PanopticSegmentation) {
    if panoptic.width != image.width() || panoptic.height != image.height() {
      warn!(
        "全景分割尺寸 {}x{} 与图像 {}x{} 不符，跳过",
        panoptic.width,
        panoptic.height,
        image.width(),
        image.height()
      );
      return;
    }

    let segment_color = |id: i32| -> Option<Rgb<u8>> {
      let segment = panoptic.segments.iter().find(|segment| segment.id == id)?;
      // 背景类别错开调色板，避免与同编号的前景类别同色
      let key = match (self.mode, segment.is_thing) {
        (ColorMode::Image, true) => segment.id as usize,
        (_, true) => segment.category_id as usize,
        (_, false) => segment.category_id as usize + STUFF_PALETTE_OFFSET,
      };
      Some(self.colors[key % self.colors.len()])
    };
    let colors: Vec<(i32, Option<Rgb<u8>>)> = panoptic
      .segments
      .iter()
      .map(|segment| (segment.id, segment_color(segment.id)))
      .collect();

    // 质心，用于放置背景类别标签
    let mut sums = vec![(0u64, 0u64, 0u64); panoptic.segments.len()];
    for (i, id) in panoptic.segment_ids.iter().enumerate() {
      if *id == 0 {
        continue;
      }
      let Some(slot) = colors.iter().position(|(segment, _)| segment == id) else {
        continue;
      };
      let x = (i as u32) % panoptic.width;
      let y = (i as u32) / panoptic.width;
      if let Some(color) = colors[slot].1 {
        blend_pixel(image.get_pixel_mut(x, y), color, PANOPTIC_ALPHA);
      }
      let sum = &mut sums[slot];
      sum.0 += x as u64;
      sum.1 += y as u64;
      sum.2 += 1;
    }

    for (segment, (sx, sy, count)) in panoptic.segments.iter().zip(sums) {
      if segment.is_thing || count == 0 {
        continue;
      }
      let (cx, cy) = ((sx / count) as i32, (sy / count) as i32);
      let color = segment_color(segment.id).unwrap_or(TEXT_COLOR);
      self.draw_label(image, cx, cy, &segment.label, color);
    }
  }
}

fn blend_pixel(pixel: &mut Rgb<u8>, color: Rgb<u8>, alpha: f32) {
  for c in 0..3 {
    let value = pixel[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha;
    pixel[c] = value.round().clamp(0.0, 255.0) as u8;
  }
}

fn blend_mask(image: &mut RgbImage, mask: &Mask, color: Rgb<u8>, alpha: f32) {
  let width = image.width().min(mask.width());
  let height = image.height().min(mask.height());
  for y in 0..height {
    for x in 0..width {
      if mask.get(x, y) {
        blend_pixel(image.get_pixel_mut(x, y), color, alpha);
      }
    }
  }
}

fn draw_keypoints(image: &mut RgbImage, keypoints: &[Keypoint], color: Rgb<u8>) {
  let visible = |k: usize| keypoints.get(k).filter(|point| point.score > KEYPOINT_THRESHOLD);

  for (a, b) in COCO_KEYPOINT_CONNECTIONS {
    if let (Some(p), Some(q)) = (visible(a), visible(b)) {
      draw_line_segment_mut(image, (p.x, p.y), (q.x, q.y), color);
    }
  }
  for point in keypoints.iter().filter(|point| point.score > KEYPOINT_THRESHOLD) {
    draw_filled_circle_mut(
      image,
      (point.x as i32, point.y as i32),
      KEYPOINT_RADIUS,
      color,
    );
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::SegmentInfo;

  fn canvas() -> RgbImage {
    RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]))
  }

  #[test]
  fn box_outline_is_drawn() {
    let draw = Draw::new(ColorMode::Image, None);
    let item = DetectItem::new(0, "person", 0.9, [2.0, 2.0, 10.0, 12.0]);
    let color = draw.item_color(0, &item);
    let result = DetectionSet::new(vec![item]);

    let image = draw.annotate(&canvas(), &result);
    assert_eq!(image.get_pixel(2, 5), &color);
    assert_eq!(image.get_pixel(6, 12), &color);
    assert_eq!(image.get_pixel(6, 7), &Rgb([0, 0, 0]));
  }

  #[test]
  fn mask_is_blended() {
    let draw = Draw::new(ColorMode::Image, None);
    let mask = Mask::from_fn(20, 20, |x, y| x == 5 && y == 5);
    let item = DetectItem::new(0, "person", 0.9, [14.0, 14.0, 18.0, 18.0]).with_mask(mask);
    let result = DetectionSet::new(vec![item]);

    let image = draw.annotate(&canvas(), &result);
    assert_ne!(image.get_pixel(5, 5), &Rgb([0, 0, 0]));
    assert_eq!(image.get_pixel(6, 6), &Rgb([0, 0, 0]));
  }

  #[test]
  fn segmentation_mode_colors_by_class() {
    let draw = Draw::new(ColorMode::Segmentation, None);
    let a = DetectItem::new(3, "car", 0.9, [0.0, 0.0, 1.0, 1.0]);
    let b = DetectItem::new(3, "car", 0.8, [0.0, 0.0, 1.0, 1.0]);
    assert_eq!(draw.item_color(0, &a), draw.item_color(1, &b));

    let draw = draw.with_mode(ColorMode::Image);
    assert_ne!(draw.item_color(0, &a), draw.item_color(1, &b));
  }

  #[test]
  fn panoptic_overlay_skips_void() {
    let draw = Draw::new(ColorMode::Segmentation, None);
    let mut ids = vec![0; 400];
    ids[0] = 1;
    let panoptic = PanopticSegmentation {
      width: 20,
      height: 20,
      segment_ids: ids.into_boxed_slice(),
      segments: vec![SegmentInfo {
        id: 1,
        category_id: 40,
        is_thing: false,
        label: "sky-other-merged".to_string(),
      }],
    };
    let result = DetectionSet::default().with_panoptic(panoptic);

    let image = draw.annotate(&canvas(), &result);
    assert_ne!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
    assert_eq!(image.get_pixel(1, 0), &Rgb([0, 0, 0]));
  }

  #[test]
  fn missing_font_file_gives_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_font(Some(&dir.path().join("none.ttf"))).is_none());
  }
}
