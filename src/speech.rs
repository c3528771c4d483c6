// 该文件是 Xunlu （寻路） 项目的一部分。
// src/speech.rs - 语音合成定义
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

use crate::{FromUrl, FromUrlWithScheme};

/// 默认语速（词/分钟）
pub const DEFAULT_RATE: u32 = 200;
/// 默认音量（0.0 - 1.0）
pub const DEFAULT_VOLUME: f32 = 1.0;

/// 阻塞式语音输出：`speak` 返回时该句已播放完毕
pub trait SpeechEngine: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error>;

  fn name(&self) -> &'static str;
}

mod espeak;
pub use self::espeak::{EspeakEngine, EspeakError};

mod log_speech;
pub use self::log_speech::{LogSpeech, LogSpeechError};

#[derive(Error, Debug)]
pub enum SpeechError {
  #[error("espeak 语音错误: {0}")]
  EspeakError(#[from] EspeakError),
  #[error("日志语音错误: {0}")]
  LogSpeechError(#[from] LogSpeechError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 语速与音量设置，从 URL 查询参数 `rate`、`volume` 读取
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
  pub rate: u32,
  pub volume: f32,
}

impl Default for VoiceSettings {
  fn default() -> Self {
    Self {
      rate: DEFAULT_RATE,
      volume: DEFAULT_VOLUME,
    }
  }
}

impl VoiceSettings {
  pub fn from_query(url: &Url) -> Self {
    let defaults = Self::default();
    Self {
      rate: crate::query_value(url, "rate").unwrap_or(defaults.rate),
      volume: crate::query_value::<f32>(url, "volume")
        .unwrap_or(defaults.volume)
        .clamp(0.0, 1.0),
    }
  }
}

pub enum SpeechWrapper {
  Espeak(EspeakEngine),
  Log(LogSpeech),
}

impl FromUrl for SpeechWrapper {
  type Error = SpeechError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      EspeakEngine::SCHEME => Ok(SpeechWrapper::Espeak(EspeakEngine::from_url(url)?)),
      LogSpeech::SCHEME => Ok(SpeechWrapper::Log(LogSpeech::from_url(url)?)),
      _ => Err(SpeechError::SchemeMismatch),
    }
  }
}

impl SpeechEngine for SpeechWrapper {
  type Error = SpeechError;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
    match self {
      SpeechWrapper::Espeak(engine) => engine.speak(text).map_err(SpeechError::from),
      SpeechWrapper::Log(engine) => engine.speak(text).map_err(SpeechError::from),
    }
  }

  fn name(&self) -> &'static str {
    match self {
      SpeechWrapper::Espeak(engine) => engine.name(),
      SpeechWrapper::Log(engine) => engine.name(),
    }
  }
}
