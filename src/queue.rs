// 该文件是 Xunlu （寻路） 项目的一部分。
// src/queue.rs - 单槽告警队列
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

//! # 告警队列
//!
//! 感知线程与播报线程之间唯一的同步点。队列只有一个槽位：
//! 新批次到达时直接覆盖尚未被取走的旧批次，保证播报的总是最新的场景，
//! 播报慢于帧率时也不会积压。
//!
//! ```
//! use xunlu::alert::{Detection, DetectionBatch};
//! use xunlu::geometry::{Bearing, BoundingBox};
//! use xunlu::queue::AlertQueue;
//!
//! let queue = AlertQueue::new();
//! let det = Detection::new("cup", BoundingBox::new(0, 0, 10, 10), 50.0, Bearing::Left);
//! queue.submit(DetectionBatch::new(1, vec![det.clone()]).unwrap());
//! queue.submit(DetectionBatch::new(2, vec![det]).unwrap());
//!
//! assert_eq!(queue.take_all().map(|b| b.frame_index()), Some(2));
//! assert!(queue.take_all().is_none());
//! ```

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::alert::{Detection, DetectionBatch};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
  /// 提交的批次数
  pub submitted: u64,
  /// 被新批次覆盖而丢弃的批次数
  pub replaced: u64,
  /// 被消费者取走的批次数
  pub taken: u64,
  /// 被 `clear` 丢弃的批次数
  pub cleared: u64,
}

#[derive(Debug, Default)]
struct Slot {
  pending: Option<DetectionBatch>,
  stats: QueueStats,
}

/// 替换式单槽队列，支持一个生产者与一个消费者并发访问
#[derive(Debug, Default)]
pub struct AlertQueue {
  slot: Mutex<Slot>,
  arrived: Condvar,
}

impl AlertQueue {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Slot> {
    // 槽位内容始终是完整的批次，持锁线程 panic 后继续使用不会读到半成品
    self.slot.lock().unwrap_or_else(|poisoned| {
      warn!("告警队列锁已中毒，继续使用");
      poisoned.into_inner()
    })
  }

  /// 提交一个批次，覆盖尚未取走的旧批次
  pub fn submit(&self, batch: DetectionBatch) {
    let mut slot = self.lock();
    slot.stats.submitted += 1;
    if let Some(stale) = slot.pending.replace(batch) {
      slot.stats.replaced += 1;
      debug!("丢弃未播报的第 {} 帧告警", stale.frame_index());
    }
    drop(slot);
    self.arrived.notify_one();
  }

  /// 取走当前批次，槽位随之清空
  pub fn take_all(&self) -> Option<DetectionBatch> {
    let mut slot = self.lock();
    let batch = slot.pending.take();
    if batch.is_some() {
      slot.stats.taken += 1;
    }
    batch
  }

  /// 等待新批次到达，最多等待 `timeout`
  pub fn wait_take(&self, timeout: Duration) -> Option<DetectionBatch> {
    let slot = self.lock();
    let (mut slot, _) = self
      .arrived
      .wait_timeout_while(slot, timeout, |slot| slot.pending.is_none())
      .unwrap_or_else(|poisoned| {
        warn!("告警队列锁已中毒，继续使用");
        poisoned.into_inner()
      });
    let batch = slot.pending.take();
    if batch.is_some() {
      slot.stats.taken += 1;
    }
    batch
  }

  /// 清空槽位，返回是否丢弃了批次
  pub fn clear(&self) -> bool {
    let mut slot = self.lock();
    let dropped = slot.pending.take().is_some();
    if dropped {
      slot.stats.cleared += 1;
    }
    dropped
  }

  pub fn is_pending(&self) -> bool {
    self.lock().pending.is_some()
  }

  pub fn stats(&self) -> QueueStats {
    self.lock().stats
  }

  /// 当前待播报内容的快照，仅用于展示与调试
  pub fn snapshot(&self) -> AlertSnapshot {
    let slot = self.lock();
    AlertSnapshot {
      frame_index: slot.pending.as_ref().map(DetectionBatch::frame_index),
      captured_at: slot
        .pending
        .as_ref()
        .map(|batch| batch.captured_at().to_rfc3339()),
      objects: slot
        .pending
        .as_ref()
        .map(|batch| batch.detections().to_vec())
        .unwrap_or_default(),
      stats: slot.stats,
    }
  }
}

/// 队列的只读快照，不保证与后续读取一致
#[derive(Debug, Clone, Serialize)]
pub struct AlertSnapshot {
  pub frame_index: Option<u64>,
  pub captured_at: Option<String>,
  pub objects: Vec<Detection>,
  pub stats: QueueStats,
}

impl AlertSnapshot {
  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }
}
