// 该文件是 Xunlu （寻路） 项目的一部分。
// src/input/v4l_input.rs - V4L2 摄像头输入
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

//! # V4L2 摄像头输入
//!
//! ## URL Scheme
//!
//! `v4l://`，例如 `v4l:///dev/video0`；不写设备路径时依次尝试
//! `/dev/video0`、`/dev/video1`、`/dev/video2`。
//!
//! ## 参数说明
//!
//! - `width`: 请求的画面宽度，默认 640
//! - `height`: 请求的画面高度，默认 480

use std::pin::Pin;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  input::{CaptureError, FrameSource},
};

const V4L_FALLBACK_DEVICES: [&str; 3] = ["/dev/video0", "/dev/video1", "/dev/video2"];
const V4L_DEFAULT_WIDTH: u32 = 640;
const V4L_DEFAULT_HEIGHT: u32 = 480;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("无法打开设备 {0}: {1}")]
  OpenError(String, std::io::Error),
  #[error("没有找到可用的摄像头")]
  NoDevice,
  #[error("V4L error: {0}")]
  V4lError(#[from] std::io::Error),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
}

/// 由于 v4l 的 Stream 需要引用 Device，用 Pin<Box<Device>> 固定设备地址，
/// 保证 Stream 持有的引用始终有效。
pub struct V4lInput {
  /// 捕获流（先于 device 释放）
  stream: Option<Stream<'static>>,
  device: Pin<Box<Device>>,
  width: u32,
  height: u32,
  frame_index: u64,
  start_time: Instant,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(V4lInputError::SchemaMismatch);
    }

    let (path, device) = if url.path().is_empty() || url.path() == "/" {
      find_device()?
    } else {
      let path = crate::decoded_path(url);
      let device =
        Device::with_path(&path).map_err(|e| V4lInputError::OpenError(path.clone(), e))?;
      (path, device)
    };

    let width = crate::query_value(url, "width").unwrap_or(V4L_DEFAULT_WIDTH);
    let height = crate::query_value(url, "height").unwrap_or(V4L_DEFAULT_HEIGHT);
    let input = Self::with_device(device, width, height)?;
    info!("摄像头已打开: {} ({}x{})", path, input.width, input.height);
    Ok(input)
  }
}

/// 依次尝试常见的设备节点，返回第一个能打开的
fn find_device() -> Result<(String, Device), V4lInputError> {
  for path in V4L_FALLBACK_DEVICES {
    match Device::with_path(path) {
      Ok(device) => return Ok((path.to_string(), device)),
      Err(e) => warn!("无法打开 {}: {}", path, e),
    }
  }
  Err(V4lInputError::NoDevice)
}

impl V4lInput {
  fn with_device(device: Device, width: u32, height: u32) -> Result<Self, V4lInputError> {
    let device = Box::pin(device);

    let mut format = device.format()?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;
    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4lInputError::UnsupportedPixelFormat(format.fourcc.to_string()));
    }

    let mut input = Self {
      stream: None,
      device,
      width: format.width,
      height: format.height,
      frame_index: 0,
      start_time: Instant::now(),
    };

    // SAFETY: device 固定在堆上且不会移动；stream 在 Drop 中先于 device 释放
    let device_ref: &Device = &input.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, 4)?
    };
    input.stream = Some(stream);
    Ok(input)
  }
}

impl Drop for V4lInput {
  fn drop(&mut self) {
    self.stream.take();
  }
}

/// 将 YUYV 格式转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let mut rgb = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}

impl FrameSource for V4lInput {
  fn read_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    let stream = self.stream.as_mut().ok_or(CaptureError::EndOfStream)?;
    let (buffer, _meta) = stream
      .next()
      .map_err(|e| CaptureError::Transient(format!("无法捕获帧: {}", e)))?;

    let expected = (self.width * self.height * 2) as usize;
    if buffer.len() < expected {
      return Err(CaptureError::Transient(format!(
        "帧数据不完整: {} / {} 字节",
        buffer.len(),
        expected
      )));
    }

    let rgb = yuyv_to_rgb(&buffer[..expected], self.width, self.height);
    let frame = RgbFrame::from_raw(self.width, self.height, rgb)
      .ok_or_else(|| CaptureError::Transient("无法创建 RGB 图像".to_string()))?
      .with_index(
        self.frame_index,
        self.start_time.elapsed().as_millis() as u64,
      );
    self.frame_index += 1;
    Ok(frame)
  }
}
