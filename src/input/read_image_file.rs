// 该文件是 Xunlu （寻路） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

//! 单张图片作为静止画面反复输出，`repeat` 参数限制输出次数

use std::time::Instant;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  input::{CaptureError, FrameSource},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

pub struct ImageFileInput {
  image: RgbImage,
  repeat: Option<u64>,
  frame_index: u64,
  start_time: Instant,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = crate::decoded_path(url);
    let image = ImageReader::open(&path)?.decode()?.to_rgb8();
    info!(
      "图片输入已打开: {} ({}x{})",
      path,
      image.width(),
      image.height()
    );

    Ok(ImageFileInput::new(image).with_repeat(crate::query_value(url, "repeat")))
  }
}

impl ImageFileInput {
  pub fn new(image: RgbImage) -> Self {
    Self {
      image,
      repeat: None,
      frame_index: 0,
      start_time: Instant::now(),
    }
  }

  pub fn with_repeat(mut self, repeat: Option<u64>) -> Self {
    self.repeat = repeat;
    self
  }
}

impl FrameSource for ImageFileInput {
  fn read_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    if self.repeat.is_some_and(|n| self.frame_index >= n) {
      return Err(CaptureError::EndOfStream);
    }

    let frame = RgbFrame::new(
      self.image.clone(),
      self.frame_index,
      self.start_time.elapsed().as_millis() as u64,
    );
    self.frame_index += 1;
    Ok(frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn repeats_until_limit() {
    let mut input = ImageFileInput::new(RgbImage::new(8, 4)).with_repeat(Some(2));
    let first = input.read_frame().unwrap();
    let second = input.read_frame().unwrap();
    assert_eq!((first.index(), second.index()), (0, 1));
    assert_eq!(first.width(), 8);
    assert!(matches!(input.read_frame(), Err(CaptureError::EndOfStream)));
  }

  #[test]
  fn loads_png_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    RgbImage::new(6, 3).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}?repeat=1", path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.read_frame().unwrap().height(), 3);
    assert!(input.read_frame().is_err());
  }

  #[test]
  fn missing_file_is_an_error() {
    let url = Url::parse("image:///nonexistent/xunlu/frame.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::IoError(_))
    ));
  }
}
