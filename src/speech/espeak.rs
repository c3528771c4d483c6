// 该文件是 Xunlu （寻路） 项目的一部分。
// src/speech/espeak.rs - espeak-ng 语音输出
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

//! # espeak-ng 语音输出
//!
//! 每句话启动一次 `espeak-ng` 进程并等待其退出，进程退出即表示播放完成。
//!
//! ## URL Scheme
//!
//! `espeak://`
//!
//! ## 参数说明
//!
//! - `rate`: 语速（词/分钟），默认 200
//! - `volume`: 音量（0.0 - 1.0），默认 1.0，映射到 espeak 的 0 - 200
//! - `voice`: 语音名称，例如 `en-us`
//! - `bin`: 可执行文件路径，默认 `espeak-ng`

use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  speech::{SpeechEngine, VoiceSettings},
};

const ESPEAK_DEFAULT_BIN: &str = "espeak-ng";
const ESPEAK_MAX_TEXT_LEN: usize = 1_000;

#[derive(Error, Debug)]
pub enum EspeakError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无法启动 {0}: {1}")]
  SpawnError(String, std::io::Error),
  #[error("{0} 执行失败: {1}")]
  ExitFailure(String, String),
  #[error("清理后文本为空")]
  EmptyText,
}

pub struct EspeakEngine {
  bin: String,
  voice: Option<String>,
  settings: VoiceSettings,
}

impl FromUrlWithScheme for EspeakEngine {
  const SCHEME: &'static str = "espeak";
}

impl FromUrl for EspeakEngine {
  type Error = EspeakError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(EspeakError::SchemeMismatch(format!(
        "期望语音方式 '{}', 实际语音方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let engine = EspeakEngine {
      bin: crate::query_value(url, "bin").unwrap_or_else(|| ESPEAK_DEFAULT_BIN.to_string()),
      voice: crate::query_value(url, "voice"),
      settings: VoiceSettings::from_query(url),
    };
    engine.check_installed()?;
    info!(
      "espeak 语音已就绪: 语速 {}, 音量 {:.2}",
      engine.settings.rate, engine.settings.volume
    );
    Ok(engine)
  }
}

impl EspeakEngine {
  /// 启动阶段确认可执行文件可用
  fn check_installed(&self) -> Result<(), EspeakError> {
    Command::new(&self.bin)
      .arg("--version")
      .output()
      .map_err(|e| EspeakError::SpawnError(self.bin.clone(), e))?;
    Ok(())
  }

  /// espeak 的音量范围为 0 - 200
  fn amplitude(&self) -> u32 {
    ((self.settings.volume * 200.0).round() as u32).min(200)
  }

  fn command(&self, text: &str) -> Command {
    let mut cmd = Command::new(&self.bin);
    cmd
      .arg("-s")
      .arg(self.settings.rate.to_string())
      .arg("-a")
      .arg(self.amplitude().to_string());
    if let Some(voice) = &self.voice {
      cmd.arg("-v").arg(voice);
    }
    cmd.arg(text);
    cmd
  }
}

/// 去掉控制字符与开头的 `-`，避免被当作命令行选项
fn sanitize(text: &str) -> String {
  text
    .chars()
    .filter(|c| !c.is_control())
    .take(ESPEAK_MAX_TEXT_LEN)
    .collect::<String>()
    .trim_start_matches('-')
    .trim()
    .to_string()
}

impl SpeechEngine for EspeakEngine {
  type Error = EspeakError;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
    let text = sanitize(text);
    if text.is_empty() {
      return Err(EspeakError::EmptyText);
    }

    debug!("espeak 播报: {}", text);
    let output = self
      .command(&text)
      .output()
      .map_err(|e| EspeakError::SpawnError(self.bin.clone(), e))?;

    if !output.status.success() {
      return Err(EspeakError::ExitFailure(
        self.bin.clone(),
        String::from_utf8_lossy(&output.stderr).trim().to_string(),
      ));
    }
    Ok(())
  }

  fn name(&self) -> &'static str {
    "espeak"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn engine(volume: f32, voice: Option<&str>) -> EspeakEngine {
    EspeakEngine {
      bin: ESPEAK_DEFAULT_BIN.to_string(),
      voice: voice.map(str::to_string),
      settings: VoiceSettings { rate: 200, volume },
    }
  }

  #[test]
  fn command_carries_rate_volume_and_voice() {
    let cmd = engine(1.0, Some("en-us")).command("cup is 2 meters on RIGHT");
    let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
    assert_eq!(
      args,
      ["-s", "200", "-a", "200", "-v", "en-us", "cup is 2 meters on RIGHT"]
    );
  }

  #[test]
  fn amplitude_scales_volume() {
    assert_eq!(engine(0.5, None).amplitude(), 100);
    assert_eq!(engine(0.0, None).amplitude(), 0);
  }

  #[test]
  fn sanitize_strips_controls_and_option_prefix() {
    assert_eq!(sanitize("--help\n"), "help");
    assert_eq!(sanitize("dog is 3 meters\u{7} on LEFT"), "dog is 3 meters on LEFT");
    assert_eq!(sanitize("\n\t"), "");
  }

  #[test]
  fn missing_binary_fails_at_startup() {
    let url = Url::parse("espeak://?bin=/nonexistent/espeak-ng-xunlu").unwrap();
    assert!(matches!(
      EspeakEngine::from_url(&url),
      Err(EspeakError::SpawnError(_, _))
    ));
  }

  #[test]
  fn failing_utterance_reports_error() {
    let mut engine = EspeakEngine {
      bin: "/nonexistent/espeak-ng-xunlu".to_string(),
      voice: None,
      settings: VoiceSettings::default(),
    };
    assert!(engine.speak("person is 6 meters on LEFT").is_err());
    assert!(matches!(engine.speak("\n"), Err(EspeakError::EmptyText)));
  }
}
