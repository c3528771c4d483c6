// 该文件是 Xunlu （寻路） 项目的一部分。
// src/speech/log_speech.rs - 日志语音输出
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

use std::{thread, time::Duration};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, speech::SpeechEngine};

#[derive(Error, Debug)]
pub enum LogSpeechError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 把播报语句写入日志，用于无声卡环境；
/// `delay_ms` 模拟每句话的播放时长
pub struct LogSpeech {
  delay: Duration,
}

impl FromUrlWithScheme for LogSpeech {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogSpeech {
  type Error = LogSpeechError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogSpeechError::SchemeMismatch);
    }
    let delay_ms: u64 = crate::query_value(url, "delay_ms").unwrap_or(0);
    Ok(LogSpeech {
      delay: Duration::from_millis(delay_ms),
    })
  }
}

impl SpeechEngine for LogSpeech {
  type Error = LogSpeechError;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
    info!("播报: {}", text);
    if !self.delay.is_zero() {
      thread::sleep(self.delay);
    }
    Ok(())
  }

  fn name(&self) -> &'static str {
    "log"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn delay_is_read_from_query() {
    let url = Url::parse("log://?delay_ms=250").unwrap();
    let speech = LogSpeech::from_url(&url).unwrap();
    assert_eq!(speech.delay, Duration::from_millis(250));
  }

  #[test]
  fn rejects_other_scheme() {
    let url = Url::parse("espeak://").unwrap();
    assert!(LogSpeech::from_url(&url).is_err());
  }
}
