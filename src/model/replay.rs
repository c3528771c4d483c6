// 该文件是 Xunlu （寻路） 项目的一部分。
// src/model/replay.rs - 回放检测结果
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

//! # 回放检测器
//!
//! 从 JSON Lines 文件读取预先录制的逐帧检测结果，每行对应一帧：
//!
//! ```text
//! [{"label": "person", "score": 0.91, "bbox": [100, 50, 180, 300]}]
//! []
//! [{"label": "chair", "bbox": [400, 120, 520, 330]}]
//! ```
//!
//! ## URL Scheme
//!
//! `replay://`
//!
//! ## 参数说明
//!
//! - `once`: 回放结束后不再循环，之后每帧返回空结果

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{CocoLabel, DetectItem, DetectResult, Model},
};

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("第 {line} 行解析失败: {source}")]
  ParseError {
    line: usize,
    source: serde_json::Error,
  },
  #[error("第 {line} 行包含未知类别: {label}")]
  UnknownLabel { line: usize, label: String },
  #[error("回放文件中没有任何帧")]
  Empty,
}

fn default_score() -> f32 {
  1.0
}

#[derive(Deserialize)]
struct ReplayItem {
  label: String,
  #[serde(default = "default_score")]
  score: f32,
  bbox: [f32; 4],
}

pub struct ReplayDetector {
  frames: Vec<DetectResult<CocoLabel>>,
  cursor: AtomicUsize,
  looping: bool,
}

impl FromUrlWithScheme for ReplayDetector {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetector {
  type Error = ReplayDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayDetectorError::SchemeMismatch);
    }

    let path = crate::decoded_path(url);
    info!("加载回放检测文件: {}", path);
    let content = std::fs::read_to_string(&path)?;
    let looping = !url.query_pairs().any(|(k, _)| k == "once");
    let detector = Self::from_lines(&content)?.looping(looping);
    info!("回放检测文件共 {} 帧", detector.frames.len());
    Ok(detector)
  }
}

impl ReplayDetector {
  /// 解析 JSON Lines 内容，空行忽略
  pub fn from_lines(content: &str) -> Result<Self, ReplayDetectorError> {
    let mut frames = Vec::new();
    for (idx, line) in content.lines().enumerate() {
      let line_no = idx + 1;
      if line.trim().is_empty() {
        continue;
      }

      let items: Vec<ReplayItem> =
        serde_json::from_str(line).map_err(|source| ReplayDetectorError::ParseError {
          line: line_no,
          source,
        })?;

      let items = items
        .into_iter()
        .map(|item| {
          let kind =
            CocoLabel::from_name(&item.label).ok_or_else(|| ReplayDetectorError::UnknownLabel {
              line: line_no,
              label: item.label.clone(),
            })?;
          Ok(DetectItem {
            kind,
            score: item.score,
            bbox: item.bbox,
          })
        })
        .collect::<Result<Vec<_>, ReplayDetectorError>>()?;
      frames.push(DetectResult::from(items));
    }

    if frames.is_empty() {
      return Err(ReplayDetectorError::Empty);
    }

    Ok(Self {
      frames,
      cursor: AtomicUsize::new(0),
      looping: true,
    })
  }

  pub fn looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn frame_count(&self) -> usize {
    self.frames.len()
  }
}

impl Model for ReplayDetector {
  type Input = RgbFrame;
  type Output = DetectResult<CocoLabel>;
  type Error = ReplayDetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let position = self.cursor.fetch_add(1, Ordering::Relaxed);
    let index = if self.looping {
      position % self.frames.len()
    } else if position < self.frames.len() {
      position
    } else {
      return Ok(DetectResult::default());
    };

    let result = self.frames[index].clone();
    debug!(
      "回放第 {} 条检测记录 (输入帧 {}): {} 个物体",
      index,
      input.index(),
      result.len()
    );
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use image::RgbImage;

  use super::*;
  use crate::model::WithLabel;

  const RECORDING: &str = r#"[{"label": "person", "score": 0.9, "bbox": [100, 50, 180, 300]}, {"label": "person", "bbox": [700, 50, 780, 300]}]

[]
"#;

  fn frame() -> RgbFrame {
    RgbFrame::from(RgbImage::new(4, 4))
  }

  #[test]
  fn replays_frames_in_order_and_loops() {
    let detector = ReplayDetector::from_lines(RECORDING).unwrap();
    assert_eq!(detector.frame_count(), 2);

    let first = detector.infer(&frame()).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first.items[0].kind.to_label_str(), "person");
    assert_eq!(first.items[0].score, 0.9);
    assert_eq!(first.items[1].score, 1.0);
    assert_eq!(first.items[1].bbox, [700.0, 50.0, 780.0, 300.0]);

    assert!(detector.infer(&frame()).unwrap().is_empty());
    assert_eq!(detector.infer(&frame()).unwrap().len(), 2);
  }

  #[test]
  fn once_mode_goes_quiet_after_recording() {
    let detector = ReplayDetector::from_lines(RECORDING).unwrap().looping(false);
    detector.infer(&frame()).unwrap();
    detector.infer(&frame()).unwrap();
    assert!(detector.infer(&frame()).unwrap().is_empty());
  }

  #[test]
  fn reports_bad_lines() {
    assert!(matches!(
      ReplayDetector::from_lines("[{\"label\": \"unicorn\", \"bbox\": [0,0,1,1]}]"),
      Err(ReplayDetectorError::UnknownLabel { line: 1, .. })
    ));
    assert!(matches!(
      ReplayDetector::from_lines("[]\nnot json"),
      Err(ReplayDetectorError::ParseError { line: 2, .. })
    ));
    assert!(matches!(
      ReplayDetector::from_lines("\n\n"),
      Err(ReplayDetectorError::Empty)
    ));
  }

  #[test]
  fn loads_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(RECORDING.as_bytes()).unwrap();
    let url = Url::from_file_path(file.path()).unwrap();
    let url = Url::parse(&format!("replay://{}?once", url.path())).unwrap();

    let detector = ReplayDetector::from_url(&url).unwrap();
    assert_eq!(detector.frame_count(), 2);
    assert!(!detector.looping);
  }
}
