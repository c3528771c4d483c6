// 该文件是 Xunlu （寻路） 项目的一部分。
// src/input/image_folder.rs - 图片目录输入
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

//! 按文件名顺序逐张读取目录中的图片，读完即结束。
//! 单张图片解码失败视为暂时性错误，下一次读取继续下一张。

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  input::{CaptureError, FrameSource},
};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录中没有图片: {0}")]
  NoImages(String),
}

pub struct ImageFolderInput {
  files: Vec<PathBuf>,
  next: usize,
  start_time: Instant,
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFolderInputError::SchemeMismatch);
    }
    Self::open(crate::decoded_path(url))
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

impl ImageFolderInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ImageFolderInputError> {
    let directory = directory.as_ref();
    let mut files = std::fs::read_dir(directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| path.is_file() && is_image(path))
      .collect::<Vec<_>>();
    files.sort();

    if files.is_empty() {
      return Err(ImageFolderInputError::NoImages(
        directory.display().to_string(),
      ));
    }

    info!("图片目录输入: {} 张图片", files.len());
    Ok(Self {
      files,
      next: 0,
      start_time: Instant::now(),
    })
  }
}

impl FrameSource for ImageFolderInput {
  fn read_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    let index = self.next;
    let path = self.files.get(index).ok_or(CaptureError::EndOfStream)?;
    self.next += 1;

    debug!("读取图片: {}", path.display());
    let image = ImageReader::open(path)
      .map_err(|e| CaptureError::Transient(format!("{}: {}", path.display(), e)))?
      .decode()
      .map_err(|e| CaptureError::Transient(format!("{}: {}", path.display(), e)))?
      .to_rgb8();

    Ok(RgbFrame::new(
      image,
      index as u64,
      self.start_time.elapsed().as_millis() as u64,
    ))
  }
}
