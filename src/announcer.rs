// 该文件是 Xunlu （寻路） 项目的一部分。
// src/announcer.rs - 语音播报线程
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

//! # 语音播报
//!
//! 播报线程不断从 [`AlertQueue`] 取出批次，按批次内顺序逐个物体播报，
//! 每句话播放完毕才开始下一句。一个批次播报完后清空队列槽位，
//! 播报期间到达的旧场景不再补播。单句失败只记录日志并跳过。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::alert::DetectionBatch;
use crate::queue::AlertQueue;
use crate::speech::SpeechEngine;

/// 队列为空时的最长等待间隔
pub const DEFAULT_IDLE: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
pub struct AnnouncerStats {
  batches: AtomicU64,
  spoken: AtomicU64,
  failed: AtomicU64,
}

impl AnnouncerStats {
  /// 已处理完毕的批次数
  pub fn batches(&self) -> u64 {
    self.batches.load(Ordering::Relaxed)
  }

  /// 成功播放的语句数
  pub fn spoken(&self) -> u64 {
    self.spoken.load(Ordering::Relaxed)
  }

  /// 播放失败被跳过的语句数
  pub fn failed(&self) -> u64 {
    self.failed.load(Ordering::Relaxed)
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
  pub spoken: usize,
  pub failed: usize,
}

pub struct Announcer<S> {
  queue: Arc<AlertQueue>,
  speech: S,
  idle: Duration,
  stats: Arc<AnnouncerStats>,
  stop: Arc<AtomicBool>,
}

impl<S: SpeechEngine> Announcer<S> {
  pub fn new(queue: Arc<AlertQueue>, speech: S) -> Self {
    Self {
      queue,
      speech,
      idle: DEFAULT_IDLE,
      stats: Arc::new(AnnouncerStats::default()),
      stop: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn with_idle(mut self, idle: Duration) -> Self {
    self.idle = idle;
    self
  }

  pub fn stats(&self) -> Arc<AnnouncerStats> {
    Arc::clone(&self.stats)
  }

  /// 按顺序播报一个批次，失败的语句跳过
  pub fn announce_batch(&mut self, batch: &DetectionBatch) -> BatchReport {
    let mut report = BatchReport::default();
    for detection in batch {
      let text = detection.utterance();
      match self.speech.speak(&text) {
        Ok(()) => {
          report.spoken += 1;
          self.stats.spoken.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
          report.failed += 1;
          self.stats.failed.fetch_add(1, Ordering::Relaxed);
          warn!("播报失败，跳过 \"{}\": {}", text, e);
        }
      }
    }
    report
  }

  /// 等待并处理至多一个批次，返回是否处理了批次
  pub fn run_once(&mut self) -> bool {
    let Some(batch) = self.queue.wait_take(self.idle) else {
      return false;
    };

    debug!(
      "开始播报第 {} 帧，共 {} 个物体",
      batch.frame_index(),
      batch.len()
    );
    let report = self.announce_batch(&batch);
    if self.queue.clear() {
      debug!("丢弃播报期间到达的过期告警");
    }
    self.stats.batches.fetch_add(1, Ordering::Relaxed);
    debug!(
      "第 {} 帧播报完成: 成功 {}, 失败 {}",
      batch.frame_index(),
      report.spoken,
      report.failed
    );
    true
  }

  pub fn run(mut self) {
    info!("播报线程启动，语音引擎: {}", self.speech.name());
    while !self.stop.load(Ordering::Relaxed) {
      self.run_once();
    }
    info!("播报线程退出");
  }
}

impl<S: SpeechEngine + 'static> Announcer<S> {
  /// 在独立线程中运行播报循环
  pub fn spawn(self) -> std::io::Result<AnnouncerHandle> {
    let stats = self.stats();
    let stop = Arc::clone(&self.stop);
    let thread = thread::Builder::new()
      .name("announcer".to_string())
      .spawn(move || self.run())?;
    Ok(AnnouncerHandle {
      stats,
      stop,
      thread,
    })
  }
}

/// 播报线程句柄；直接丢弃即让线程随进程结束
pub struct AnnouncerHandle {
  stats: Arc<AnnouncerStats>,
  stop: Arc<AtomicBool>,
  thread: JoinHandle<()>,
}

impl AnnouncerHandle {
  pub fn stats(&self) -> &AnnouncerStats {
    &self.stats
  }

  pub fn is_running(&self) -> bool {
    !self.thread.is_finished()
  }

  /// 请求退出并等待当前语句结束
  pub fn stop(self) -> thread::Result<()> {
    self.stop.store(true, Ordering::Relaxed);
    self.thread.join()
  }
}
