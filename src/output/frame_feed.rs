// 该文件是 Xunlu （寻路） 项目的一部分。
// src/output/frame_feed.rs - 最新画面推送
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

//! # 画面推送
//!
//! 标注后的画面编码为 JPEG，放进一个只保存最新一帧的共享槽位，
//! 由推流服务按需读取，读取方不会阻塞感知循环。
//!
//! ## URL Scheme
//!
//! `feed://`
//!
//! ## 参数说明
//!
//! - `quality`: JPEG 质量 (1-100)，默认 80
//! - `font`: 标注字体文件路径

use std::sync::{Arc, Mutex, MutexGuard};

use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  alert::Detection,
  frame::RgbFrame,
  output::{
    Render,
    draw::{Draw, DrawError},
  },
};

const DEFAULT_JPEG_QUALITY: u8 = 80;
const MJPEG_BOUNDARY: &str = "frame";

#[derive(Error, Debug)]
pub enum FrameFeedError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("JPEG 编码失败: {0}")]
  EncodeError(#[from] image::ImageError),
  #[error("绘制初始化失败: {0}")]
  DrawError(#[from] DrawError),
}

#[derive(Default)]
struct FeedSlot {
  jpeg: Option<Arc<[u8]>>,
  published: u64,
}

/// 最新一帧 JPEG 的共享槽位，克隆后指向同一个槽位
#[derive(Clone, Default)]
pub struct FrameFeed {
  slot: Arc<Mutex<FeedSlot>>,
}

impl FrameFeed {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, FeedSlot> {
    self.slot.lock().unwrap_or_else(|poisoned| {
      warn!("画面槽位锁已中毒，继续使用");
      poisoned.into_inner()
    })
  }

  /// 用新画面覆盖旧画面
  pub fn publish(&self, jpeg: Vec<u8>) {
    let mut slot = self.lock();
    slot.jpeg = Some(jpeg.into());
    slot.published += 1;
  }

  pub fn latest_jpeg(&self) -> Option<Arc<[u8]>> {
    self.lock().jpeg.clone()
  }

  pub fn published(&self) -> u64 {
    self.lock().published
  }

  /// `multipart/x-mixed-replace` 响应头里使用的内容类型
  pub fn mjpeg_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", MJPEG_BOUNDARY)
  }

  /// 最新画面对应的一个 MJPEG 分段，还没有画面时返回 `None`
  pub fn mjpeg_part(&self) -> Option<Vec<u8>> {
    let jpeg = self.latest_jpeg()?;
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", MJPEG_BOUNDARY);
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(&jpeg);
    part.extend_from_slice(b"\r\n");
    Some(part)
  }
}

pub struct FrameFeedOutput {
  feed: FrameFeed,
  draw: Draw,
  quality: u8,
}

impl FromUrlWithScheme for FrameFeedOutput {
  const SCHEME: &'static str = "feed";
}

impl FromUrl for FrameFeedOutput {
  type Error = FrameFeedError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FrameFeedError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let quality = crate::query_value(url, "quality")
      .unwrap_or(DEFAULT_JPEG_QUALITY)
      .clamp(1, 100);
    Ok(Self::new(FrameFeed::new(), Draw::from_url(url)?).with_quality(quality))
  }
}

impl FrameFeedOutput {
  pub fn new(feed: FrameFeed, draw: Draw) -> Self {
    Self {
      feed,
      draw,
      quality: DEFAULT_JPEG_QUALITY,
    }
  }

  pub fn with_quality(mut self, quality: u8) -> Self {
    self.quality = quality;
    self
  }

  pub fn feed(&self) -> FrameFeed {
    self.feed.clone()
  }
}

impl Render<RgbFrame, [Detection]> for FrameFeedOutput {
  type Error = FrameFeedError;

  fn render_result(&self, frame: &RgbFrame, result: &[Detection]) -> Result<(), Self::Error> {
    let image = self.draw.draw_detections(frame, result);
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(&image)?;
    debug!("推送第 {} 帧画面: {} 字节", frame.index(), jpeg.len());
    self.feed.publish(jpeg);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;

  #[test]
  fn keeps_only_latest_frame() {
    let output = FrameFeedOutput::from_url(&Url::parse("feed://?quality=50").unwrap()).unwrap();
    let feed = output.feed();
    assert!(feed.latest_jpeg().is_none());
    assert!(feed.mjpeg_part().is_none());

    output
      .render_result(&RgbFrame::from(RgbImage::new(8, 8)), &[])
      .unwrap();
    output
      .render_result(&RgbFrame::from(RgbImage::new(16, 4)), &[])
      .unwrap();
    assert_eq!(feed.published(), 2);

    let jpeg = feed.latest_jpeg().unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 4));
  }

  #[test]
  fn mjpeg_part_wraps_jpeg() {
    let feed = FrameFeed::new();
    feed.publish(vec![0xFF, 0xD8, 0xFF, 0xD9]);
    let part = feed.mjpeg_part().unwrap();
    assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
    assert!(part.ends_with(&[0xFF, 0xD9, b'\r', b'\n']));
    assert_eq!(
      FrameFeed::mjpeg_content_type(),
      "multipart/x-mixed-replace; boundary=frame"
    );
  }
}
