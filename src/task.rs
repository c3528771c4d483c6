// 该文件是 Xunlu （寻路） 项目的一部分。
// src/task.rs - 任务编排
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

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{thread, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

use crate::alert::{Detection, DetectionBatch};
use crate::announcer::{Announcer, AnnouncerHandle, DEFAULT_IDLE};
use crate::frame::RgbFrame;
use crate::geometry::GeometryClassifier;
use crate::input::FrameSource;
use crate::model::{DetectResult, Model, WithLabel};
use crate::output::Render;
use crate::perception::{DEFAULT_MIN_CONFIDENCE, PerceptionLoop, PerceptionStats, classify_result};
use crate::queue::AlertQueue;
use crate::speech::SpeechEngine;

/// 收到中断信号后强制退出前的等待时间
const FORCE_EXIT_GRACE: Duration = Duration::from_secs(30);

pub trait Task<I, M, O, S>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O, speech: S) -> Result<(), Self::Error>;
}

/// 单帧任务：检测一帧并同步播报全部物体，不启动播报线程。
///
/// 与持续任务相同，画面默认先做水平镜像，播报失败的语句跳过。
#[derive(Debug)]
pub struct OneShotTask {
  classifier: GeometryClassifier,
  min_confidence: Option<f32>,
  mirror: bool,
}

impl Default for OneShotTask {
  fn default() -> Self {
    Self {
      classifier: GeometryClassifier::default(),
      min_confidence: None,
      mirror: true,
    }
  }
}

impl OneShotTask {
  pub fn with_classifier(mut self, classifier: GeometryClassifier) -> Self {
    self.classifier = classifier;
    self
  }

  pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
    self.min_confidence = Some(min_confidence);
    self
  }
  pub fn with_mirror(mut self, mirror: bool) -> Self {
    self.mirror = mirror;
    self
  }
}

impl<I, M, O, S, T, ME, RE> Task<I, M, O, S> for OneShotTask
where
  I: FrameSource,
  M: Model<Input = RgbFrame, Output = DetectResult<T>, Error = ME>,
  O: Render<RgbFrame, [Detection], Error = RE>,
  S: SpeechEngine,
  T: WithLabel,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O, speech: S) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.read_frame().context("没有输入帧")?;
    let frame = if self.mirror { frame.mirrored() } else { frame };
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let detections = classify_result(
      &self.classifier,
      &result,
      frame.width(),
      self.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
    );
    output.render_result(&frame, &detections)?;

    let Some(batch) = DetectionBatch::new(frame.index(), detections) else {
      info!("画面中没有物体");
      return Ok(());
    };
    // 不经过队列，直接在当前线程逐句播报
    let report = Announcer::new(Arc::new(AlertQueue::new()), speech).announce_batch(&batch);
    info!(
      "播报完成，共 {} 个物体，{} 句成功，{} 句失败",
      batch.len(),
      report.spoken,
      report.failed
    );
    Ok(())
  }
}

/// 持续任务：播报线程在后台运行，感知循环占用当前线程
#[derive(Debug)]
pub struct AlertTask {
  frame_number: Option<u64>,
  classifier: GeometryClassifier,
  min_confidence: f32,
  mirror: bool,
  idle: Duration,
  queue: Arc<AlertQueue>,
}

impl Default for AlertTask {
  fn default() -> Self {
    Self {
      frame_number: None,
      classifier: GeometryClassifier::default(),
      min_confidence: DEFAULT_MIN_CONFIDENCE,
      mirror: true,
      idle: DEFAULT_IDLE,
      queue: Arc::new(AlertQueue::new()),
    }
  }
}

impl AlertTask {
  pub fn with_frame_number(mut self, frame_number: Option<u64>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_classifier(mut self, classifier: GeometryClassifier) -> Self {
    self.classifier = classifier;
    self
  }

  pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
    self.min_confidence = min_confidence;
    self
  }

  pub fn with_mirror(mut self, mirror: bool) -> Self {
    self.mirror = mirror;
    self
  }

  pub fn with_idle(mut self, idle: Duration) -> Self {
    self.idle = idle;
    self
  }

  /// 感知与播报共享的告警队列，可供推流服务读取快照
  pub fn queue(&self) -> Arc<AlertQueue> {
    Arc::clone(&self.queue)
  }

  /// 启动播报线程并在当前线程运行感知循环，直到 `stop` 被置位或输入结束。
  ///
  /// 返回时播报线程仍在运行，由调用方决定是否停止。
  pub fn run_until<I, M, O, S, T>(
    self,
    input: I,
    model: M,
    output: O,
    speech: S,
    stop: &AtomicBool,
  ) -> anyhow::Result<(PerceptionStats, AnnouncerHandle)>
  where
    I: FrameSource,
    M: Model<Input = RgbFrame, Output = DetectResult<T>>,
    M::Error: Display,
    O: Render<RgbFrame, [Detection]>,
    O::Error: Display,
    S: SpeechEngine + 'static,
    T: WithLabel,
  {
    let announcer = Announcer::new(self.queue(), speech)
      .with_idle(self.idle)
      .spawn()
      .context("无法启动播报线程")?;

    let mut perception = PerceptionLoop::new(input, model, output, self.queue())
      .with_classifier(self.classifier)
      .with_mirror(self.mirror)
      .with_min_confidence(self.min_confidence);
    let stats = perception.run(stop, self.frame_number);
    Ok((stats, announcer))
  }
}

impl<I, M, O, S, T> Task<I, M, O, S> for AlertTask
where
  I: FrameSource,
  M: Model<Input = RgbFrame, Output = DetectResult<T>>,
  M::Error: Display,
  O: Render<RgbFrame, [Detection]>,
  O::Error: Display,
  S: SpeechEngine + 'static,
  T: WithLabel,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O, speech: S) -> Result<(), Self::Error> {
    info!("开始任务...");
    let stop = Arc::new(AtomicBool::new(false));

    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      handler_stop.store(true, Ordering::Relaxed);
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_GRACE);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .context("无法设置 Ctrl-C 处理函数")?;

    let (stats, announcer) = self.run_until(input, model, output, speech, &stop)?;
    info!(
      "任务完成: 处理 {} 帧，播报 {} 个批次，{} 句成功，{} 句失败",
      stats.frames,
      announcer.stats().batches(),
      announcer.stats().spoken(),
      announcer.stats().failed()
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use image::{Rgb, RgbImage};
  use thiserror::Error;

  use super::*;
  use crate::input::{CaptureError, from_iter};
  use crate::model::ReplayDetector;
  use crate::output::NoneOutput;

  #[derive(Error, Debug)]
  #[error("不会发生")]
  struct Never;

  #[derive(Clone, Default)]
  struct Transcript(Arc<Mutex<Vec<String>>>);

  impl SpeechEngine for Transcript {
    type Error = Never;

    fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
      self.0.lock().unwrap().push(text.to_string());
      Ok(())
    }

    fn name(&self) -> &'static str {
      "transcript"
    }
  }

  #[derive(Error, Debug)]
  #[error("音频设备不可用")]
  struct AudioUnavailable;

  /// 第一句失败，之后正常记录
  #[derive(Clone, Default)]
  struct FlakyTranscript {
    spoken: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<usize>>,
  }

  impl SpeechEngine for FlakyTranscript {
    type Error = AudioUnavailable;

    fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
      let mut calls = self.calls.lock().unwrap();
      *calls += 1;
      if *calls == 1 {
        return Err(AudioUnavailable);
      }
      self.spoken.lock().unwrap().push(text.to_string());
      Ok(())
    }

    fn name(&self) -> &'static str {
      "flaky"
    }
  }

  fn still(width: u32) -> Vec<Result<RgbFrame, CaptureError>> {
    vec![Ok(RgbFrame::from(RgbImage::new(width, 10)))]
  }

  #[test]
  fn one_shot_speaks_every_object() {
    let model = ReplayDetector::from_lines(
      r#"[{"label": "person", "bbox": [100, 0, 180, 10]}, {"label": "bottle", "bbox": [400, 0, 450, 10]}]"#,
    )
    .unwrap();
    let transcript = Transcript::default();
    OneShotTask::default()
      .with_mirror(false)
      .run_task(from_iter(still(900)), model, NoneOutput, transcript.clone())
      .unwrap();
    assert_eq!(
      *transcript.0.lock().unwrap(),
      ["person is 6 meters on LEFT", "bottle is 10 meters on FORWARD"]
    );
  }

  #[test]
  fn one_shot_skips_failed_utterances() {
    let model = ReplayDetector::from_lines(
      r#"[{"label": "person", "bbox": [100, 0, 180, 10]}, {"label": "person", "bbox": [700, 0, 780, 10]}]"#,
    )
    .unwrap();
    let transcript = FlakyTranscript::default();
    OneShotTask::default()
      .with_mirror(false)
      .run_task(from_iter(still(900)), model, NoneOutput, transcript.clone())
      .unwrap();
    assert_eq!(*transcript.calls.lock().unwrap(), 2);
    assert_eq!(
      *transcript.spoken.lock().unwrap(),
      ["person is 6 meters on RIGHT"]
    );
  }

  #[derive(Clone, Default)]
  struct FirstPixel(Arc<Mutex<Option<Rgb<u8>>>>);

  impl Render<RgbFrame, [Detection]> for FirstPixel {
    type Error = Never;

    fn render_result(&self, frame: &RgbFrame, _result: &[Detection]) -> Result<(), Self::Error> {
      *self.0.lock().unwrap() = Some(*frame.image().get_pixel(0, 0));
      Ok(())
    }
  }

  #[test]
  fn one_shot_mirrors_by_default() {
    let mut image = RgbImage::new(4, 1);
    image.put_pixel(3, 0, Rgb([255, 0, 0]));

    let output = FirstPixel::default();
    OneShotTask::default()
      .run_task(
        from_iter(vec![Ok(RgbFrame::from(image.clone()))]),
        ReplayDetector::from_lines("[]").unwrap(),
        output.clone(),
        Transcript::default(),
      )
      .unwrap();
    assert_eq!(*output.0.lock().unwrap(), Some(Rgb([255, 0, 0])));

    let output = FirstPixel::default();
    OneShotTask::default()
      .with_mirror(false)
      .run_task(
        from_iter(vec![Ok(RgbFrame::from(image))]),
        ReplayDetector::from_lines("[]").unwrap(),
        output.clone(),
        Transcript::default(),
      )
      .unwrap();
    assert_eq!(*output.0.lock().unwrap(), Some(Rgb([0, 0, 0])));
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let model = ReplayDetector::from_lines("[]").unwrap();
    let result = OneShotTask::default().run_task(
      from_iter(Vec::new()),
      model,
      NoneOutput,
      Transcript::default(),
    );
    assert!(result.is_err());
  }

  #[test]
  fn alert_task_feeds_the_announcer() {
    let model = ReplayDetector::from_lines(r#"[{"label": "dog", "bbox": [700, 0, 800, 10]}]"#)
      .unwrap()
      .looping(false);
    let transcript = Transcript::default();
    let task = AlertTask::default().with_idle(Duration::from_millis(10));
    let queue = task.queue();

    let (stats, announcer) = task
      .run_until(
        from_iter(still(900)),
        model,
        NoneOutput,
        transcript.clone(),
        &AtomicBool::new(false),
      )
      .unwrap();
    assert_eq!(stats.submitted, 1);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while announcer.stats().batches() < 1 && std::time::Instant::now() < deadline {
      thread::sleep(Duration::from_millis(5));
    }
    announcer.stop().unwrap();
    assert_eq!(*transcript.0.lock().unwrap(), ["dog is 5 meters on RIGHT"]);
    assert!(!queue.is_pending());
  }
}
