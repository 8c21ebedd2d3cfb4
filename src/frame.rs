// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/frame.rs - 帧定义
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

use image::RgbImage;

const RGB_CHANNELS: usize = 3;

/// 解码后的一帧图像
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引，从 0 开始
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  /// 单张图片作为第 0 帧
  pub fn still(image: RgbImage) -> Self {
    Self::new(image, 0, 0)
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }

  /// 从 1 开始的帧序号
  pub fn number(&self) -> u64 {
    self.index + 1
  }

  /// 转为 BGR 通道顺序的 CHW 浮点数据（0..255）
  pub fn to_bgr_chw(&self) -> Vec<f32> {
    let width = self.width() as usize;
    let height = self.height() as usize;
    let plane = width * height;
    let mut data = vec![0f32; plane * RGB_CHANNELS];

    for (x, y, pixel) in self.image.enumerate_pixels() {
      let idx = y as usize * width + x as usize;
      data[idx] = pixel[2] as f32;
      data[plane + idx] = pixel[1] as f32;
      data[2 * plane + idx] = pixel[0] as f32;
    }
    data
  }
}

/// 每行 `stride` 字节的 RGB 数据（行尾可能有对齐填充）转为紧凑图像
#[cfg_attr(not(feature = "gstreamer"), allow(dead_code))]
pub(crate) fn unpack_rgb_rows(
  data: &[u8],
  width: u32,
  height: u32,
  stride: usize,
) -> Result<RgbImage, String> {
  let row = width as usize * RGB_CHANNELS;
  let rows = height as usize;
  let expected = stride * rows.saturating_sub(1) + row;
  if stride < row || data.len() < expected {
    return Err(format!(
      "缓冲区大小不匹配: 期望 {} 字节, 实际 {} 字节 (行跨度 {})",
      expected,
      data.len(),
      stride
    ));
  }

  let mut pixels = Vec::with_capacity(row * rows);
  for y in 0..rows {
    let start = y * stride;
    pixels.extend_from_slice(&data[start..start + row]);
  }
  RgbImage::from_raw(width, height, pixels).ok_or_else(|| "无法创建 RGB 图像".to_string())
}

/// 把紧凑图像按每行 `stride` 字节写入 `dst`，填充字节置零
#[cfg_attr(not(feature = "gstreamer"), allow(dead_code))]
pub(crate) fn pack_rgb_rows(image: &RgbImage, stride: usize, dst: &mut [u8]) -> Result<(), String> {
  let row = image.width() as usize * RGB_CHANNELS;
  let rows = image.height() as usize;
  let expected = stride * rows.saturating_sub(1) + row;
  if stride < row || dst.len() < expected {
    return Err(format!(
      "缓冲区大小不匹配: 需要 {} 字节, 实际 {} 字节 (行跨度 {})",
      expected,
      dst.len(),
      stride
    ));
  }

  dst.fill(0);
  for (y, src) in image.as_raw().chunks_exact(row.max(1)).take(rows).enumerate() {
    let start = y * stride;
    dst[start..start + row].copy_from_slice(src);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn bgr_chw_layout() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([1, 2, 3]));
    image.put_pixel(1, 0, Rgb([4, 5, 6]));
    let frame = Frame::still(image);

    assert_eq!(frame.to_bgr_chw(), vec![3.0, 6.0, 2.0, 5.0, 1.0, 4.0]);
  }

  #[test]
  fn zero_sized_frame_is_empty() {
    assert!(Frame::still(RgbImage::new(0, 4)).is_empty());
    assert!(!Frame::still(RgbImage::new(1, 1)).is_empty());
  }

  /// GStreamer 默认的 RGB 行跨度：按 4 字节对齐
  fn aligned_stride(width: u32) -> usize {
    (width as usize * 3 + 3) & !3
  }

  #[test]
  fn odd_width_rows_are_padded_to_stride() {
    let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8, y as u8, 7]));
    let stride = aligned_stride(5);
    assert_eq!(stride, 16);

    let mut buffer = vec![0xff; stride * 3];
    pack_rgb_rows(&image, stride, &mut buffer).unwrap();
    assert_eq!(&buffer[16..19], &[0, 1, 7]);
    assert_eq!(buffer[15], 0);

    let unpacked = unpack_rgb_rows(&buffer, 5, 3, stride).unwrap();
    assert_eq!(unpacked, image);
  }

  #[test]
  fn short_buffers_are_rejected() {
    let image = RgbImage::new(854, 2);
    let stride = aligned_stride(854);
    assert_eq!(stride, 2564);

    let mut tight = vec![0; 854 * 3 * 2];
    assert!(pack_rgb_rows(&image, stride, &mut tight).is_err());
    assert!(unpack_rgb_rows(&tight[..854 * 3], 854, 2, stride).is_err());
    assert!(pack_rgb_rows(&image, 854 * 3 - 1, &mut tight).is_err());
  }

  #[test]
  fn number_is_one_based() {
    let frame = Frame::new(RgbImage::new(1, 1), 6, 300);
    assert_eq!(frame.number(), 7);
  }
}
