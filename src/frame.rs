// 该文件是 Xunlu （寻路） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

/// 采集得到的一帧 RGB 图像（NHWC 排列）
#[derive(Debug, Clone)]
pub struct RgbFrame {
  image: RgbImage,
  index: u64,
  timestamp_ms: u64,
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    Self::new(image, 0, 0)
  }
}

impl RgbFrame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  /// 由原始 RGB24 数据构造，长度不匹配时返回 `None`
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
    RgbImage::from_raw(width, height, data).map(Self::from)
  }

  pub fn with_index(mut self, index: u64, timestamp_ms: u64) -> Self {
    self.index = index;
    self.timestamp_ms = timestamp_ms;
    self
  }

  /// 水平镜像（前置摄像头的自拍视角）
  pub fn mirrored(mut self) -> Self {
    image::imageops::flip_horizontal_in_place(&mut self.image);
    self
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  /// 帧序号
  pub fn index(&self) -> u64 {
    self.index
  }

  /// 相对采集开始的时间戳（毫秒）
  pub fn timestamp_ms(&self) -> u64 {
    self.timestamp_ms
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn from_raw_rejects_wrong_length() {
    assert!(RgbFrame::from_raw(2, 2, vec![0u8; 11]).is_none());
    let frame = RgbFrame::from_raw(2, 2, vec![0u8; 12]).unwrap();
    assert_eq!((frame.width(), frame.height()), (2, 2));
    assert_eq!(frame.image().as_raw().len(), 12);
  }

  #[test]
  fn mirrored_swaps_left_and_right() {
    let mut image = RgbImage::new(3, 1);
    image.put_pixel(0, 0, Rgb([255, 0, 0]));
    let frame = RgbFrame::new(image, 7, 42).mirrored();
    assert_eq!(frame.image().get_pixel(2, 0), &Rgb([255, 0, 0]));
    assert_eq!(frame.image().get_pixel(0, 0), &Rgb([0, 0, 0]));
    assert_eq!((frame.index(), frame.timestamp_ms()), (7, 42));
  }
}
