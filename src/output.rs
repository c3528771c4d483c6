// 该文件是 Xunlu （寻路） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::alert::Detection;
use crate::frame::RgbFrame;
use crate::{FromUrl, FromUrlWithScheme};

pub trait Render<Frame, Output: ?Sized>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub mod draw;
pub use self::draw::{Draw, DrawError};

mod frame_feed;
pub use self::frame_feed::{FrameFeed, FrameFeedError, FrameFeedOutput};

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

/// 丢弃所有画面，只用于不需要可视化的场景
#[derive(Debug, Default)]
pub struct NoneOutput;

impl FromUrlWithScheme for NoneOutput {
  const SCHEME: &'static str = "none";
}

impl FromUrl for NoneOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch);
    }
    Ok(NoneOutput)
  }
}

impl Render<RgbFrame, [Detection]> for NoneOutput {
  type Error = OutputError;

  fn render_result(&self, _frame: &RgbFrame, _result: &[Detection]) -> Result<(), Self::Error> {
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 命令行可用的输出。`feed://` 需要调用方持有 [`FrameFeed`] 读取画面，
/// 只能通过 [`FrameFeedOutput`] 直接构造。
pub enum OutputWrapper {
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
  None(NoneOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      NoneOutput::SCHEME => Ok(OutputWrapper::None(NoneOutput::from_url(url)?)),
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Render<RgbFrame, [Detection]> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbFrame, result: &[Detection]) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::None(output) => output.render_result(frame, result),
    }
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;

  #[test]
  fn dispatches_by_scheme() {
    let none = OutputWrapper::from_url(&Url::parse("none://").unwrap()).unwrap();
    assert!(matches!(none, OutputWrapper::None(_)));

    // 画面推送只能由持有 FrameFeed 的调用方直接构造
    assert!(matches!(
      OutputWrapper::from_url(&Url::parse("feed://").unwrap()),
      Err(OutputError::SchemeMismatch)
    ));
    assert!(matches!(
      OutputWrapper::from_url(&Url::parse("rtsp://0.0.0.0:8554/live").unwrap()),
      Err(OutputError::SchemeMismatch)
    ));
  }

  #[test]
  fn none_output_accepts_every_frame() {
    let frame = RgbFrame::from(RgbImage::new(4, 4));
    assert!(NoneOutput.render_result(&frame, &[]).is_ok());
  }
}
