// 该文件是 Xunlu （寻路） 项目的一部分。
// src/perception.rs - 感知循环
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

//! # 感知循环
//!
//! 每一轮：取帧、（可选）镜像、检测、计算距离与方位、提交告警批次、渲染画面。
//! 取帧暂时失败时稍后重试，检测或渲染失败只跳过当前帧，
//! 感知循环从不等待播报线程。

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::alert::{Detection, DetectionBatch};
use crate::frame::RgbFrame;
use crate::geometry::{BoundingBox, GeometryClassifier};
use crate::input::{CaptureError, FrameSource};
use crate::model::{DetectResult, Model, WithLabel};
use crate::output::Render;
use crate::queue::AlertQueue;

/// 低于该置信度的检测结果直接丢弃
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.3;
/// 取帧暂时失败后的重试间隔
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// 单轮处理的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
  /// 提交了包含 n 个物体的批次
  Submitted(usize),
  /// 画面中没有物体
  Empty,
  /// 检测失败，跳过本帧
  Skipped,
  /// 暂时没有取到帧
  Retry,
  EndOfStream,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PerceptionStats {
  pub frames: u64,
  pub submitted: u64,
  pub skipped: u64,
  pub retries: u64,
  pub render_failures: u64,
}

/// 把检测器输出转换为带距离和方位的物体列表，保持检测器输出顺序
pub fn classify_result<T: WithLabel>(
  classifier: &GeometryClassifier,
  result: &DetectResult<T>,
  frame_width: u32,
  min_confidence: f32,
) -> Vec<Detection> {
  result
    .items
    .iter()
    .filter(|item| item.score >= min_confidence)
    .map(|item| {
      let bbox = BoundingBox::from_xyxy(&item.bbox);
      let (distance, bearing) = classifier.classify(&bbox, frame_width);
      Detection::new(item.kind.to_label_str(), bbox, distance, bearing)
    })
    .collect()
}

pub struct PerceptionLoop<S, M, O> {
  source: S,
  model: M,
  output: O,
  queue: Arc<AlertQueue>,
  classifier: GeometryClassifier,
  mirror: bool,
  min_confidence: f32,
  retry_delay: Duration,
  stats: PerceptionStats,
}

impl<S, M, O> PerceptionLoop<S, M, O> {
  pub fn new(source: S, model: M, output: O, queue: Arc<AlertQueue>) -> Self {
    Self {
      source,
      model,
      output,
      queue,
      classifier: GeometryClassifier::default(),
      mirror: true,
      min_confidence: DEFAULT_MIN_CONFIDENCE,
      retry_delay: DEFAULT_RETRY_DELAY,
      stats: PerceptionStats::default(),
    }
  }

  pub fn with_classifier(mut self, classifier: GeometryClassifier) -> Self {
    self.classifier = classifier;
    self
  }

  pub fn with_mirror(mut self, mirror: bool) -> Self {
    self.mirror = mirror;
    self
  }

  pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
    self.min_confidence = min_confidence;
    self
  }

  pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
    self.retry_delay = retry_delay;
    self
  }

  pub fn stats(&self) -> PerceptionStats {
    self.stats
  }

  pub fn output(&self) -> &O {
    &self.output
  }
}

impl<S, M, O, T> PerceptionLoop<S, M, O>
where
  S: FrameSource,
  M: Model<Input = RgbFrame, Output = DetectResult<T>>,
  M::Error: Display,
  O: Render<RgbFrame, [Detection]>,
  O::Error: Display,
  T: WithLabel,
{
  pub fn run_once(&mut self) -> FrameOutcome {
    let frame = match self.source.read_frame() {
      Ok(frame) => frame,
      Err(CaptureError::Transient(reason)) => {
        warn!("取帧失败，稍后重试: {}", reason);
        self.stats.retries += 1;
        thread::sleep(self.retry_delay);
        return FrameOutcome::Retry;
      }
      Err(CaptureError::EndOfStream) => return FrameOutcome::EndOfStream,
    };
    let frame = if self.mirror { frame.mirrored() } else { frame };
    self.stats.frames += 1;

    let now = Instant::now();
    let result = match self.model.infer(&frame) {
      Ok(result) => result,
      Err(e) => {
        warn!("第 {} 帧检测失败，跳过: {}", frame.index(), e);
        self.stats.skipped += 1;
        return FrameOutcome::Skipped;
      }
    };
    let elapsed = now.elapsed();

    let detections = classify_result(
      &self.classifier,
      &result,
      frame.width(),
      self.min_confidence,
    );
    let count = detections.len();

    let outcome = match DetectionBatch::new(frame.index(), detections.clone()) {
      Some(batch) => {
        self.queue.submit(batch);
        self.stats.submitted += 1;
        FrameOutcome::Submitted(count)
      }
      None => FrameOutcome::Empty,
    };

    if let Err(e) = self.output.render_result(&frame, &detections) {
      warn!("第 {} 帧渲染失败: {}", frame.index(), e);
      self.stats.render_failures += 1;
    }

    debug!(
      "第 {} 帧: {} 个物体，推理耗时 {:.2?}，总耗时 {:.2?}",
      frame.index(),
      count,
      elapsed,
      now.elapsed()
    );
    outcome
  }

  /// 持续处理直到输入结束、收到停止信号或达到指定帧数
  pub fn run(&mut self, stop: &AtomicBool, frame_number: Option<u64>) -> PerceptionStats {
    info!("感知循环启动");
    loop {
      if stop.load(Ordering::Relaxed) {
        warn!("收到停止信号，退出感知循环");
        break;
      }
      if self.run_once() == FrameOutcome::EndOfStream {
        info!("输入源已结束");
        break;
      }
      if frame_number.is_some_and(|n| self.stats.frames >= n) {
        info!("达到指定帧数 {}, 退出感知循环", self.stats.frames);
        break;
      }
    }
    info!(
      "感知循环结束: 处理 {} 帧，提交 {} 个批次",
      self.stats.frames, self.stats.submitted
    );
    self.stats
  }
}
