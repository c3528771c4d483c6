// 该文件是 Xunlu （寻路） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;

use crate::{FromUrl, frame::RgbFrame};

/// 帧采集失败的原因
#[derive(Error, Debug)]
pub enum CaptureError {
  /// 本次没有取到帧，下一轮可以重试
  #[error("暂时无法获取帧: {0}")]
  Transient(String),
  /// 输入源已经结束
  #[error("输入源已结束")]
  EndOfStream,
}

/// 帧采集源
pub trait FrameSource {
  fn read_frame(&mut self) -> Result<RgbFrame, CaptureError>;
}

/// 把任意迭代器包装为采集源，迭代结束即输入结束
pub struct IterSource<I> {
  inner: I,
}

pub fn from_iter<I>(inner: I) -> IterSource<I::IntoIter>
where
  I: IntoIterator<Item = Result<RgbFrame, CaptureError>>,
{
  IterSource {
    inner: inner.into_iter(),
  }
}

impl<I: Iterator<Item = Result<RgbFrame, CaptureError>>> FrameSource for IterSource<I> {
  fn read_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    self.inner.next().unwrap_or(Err(CaptureError::EndOfStream))
  }
}

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

mod image_folder;
pub use self::image_folder::{ImageFolderInput, ImageFolderInputError};

#[cfg(feature = "v4l_input")]
mod v4l_input;
#[cfg(feature = "v4l_input")]
pub use self::v4l_input::{V4lInput, V4lInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Image folder input error: {0}")]
  ImageFolderInputError(#[from] ImageFolderInputError),
  #[cfg(feature = "v4l_input")]
  #[error("V4L input error: {0}")]
  V4lInputError(#[from] V4lInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ImageFolder(ImageFolderInput),
  #[cfg(feature = "v4l_input")]
  V4l(V4lInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      ImageFolderInput::SCHEME => Ok(InputWrapper::ImageFolder(ImageFolderInput::from_url(url)?)),
      #[cfg(feature = "v4l_input")]
      V4lInput::SCHEME => Ok(InputWrapper::V4l(V4lInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl FrameSource for InputWrapper {
  fn read_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    match self {
      InputWrapper::ReadImageFile(input) => input.read_frame(),
      InputWrapper::ImageFolder(input) => input.read_frame(),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.read_frame(),
    }
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;

  #[test]
  fn iter_source_ends_after_items() {
    let mut source = from_iter(vec![
      Ok(RgbFrame::from(RgbImage::new(2, 2))),
      Err(CaptureError::Transient("sensor busy".to_string())),
    ]);
    assert!(source.read_frame().is_ok());
    assert!(matches!(source.read_frame(), Err(CaptureError::Transient(_))));
    assert!(matches!(source.read_frame(), Err(CaptureError::EndOfStream)));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }
}
