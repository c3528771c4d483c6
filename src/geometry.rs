// 该文件是 Xunlu （寻路） 项目的一部分。
// src/geometry.rs - 距离估计与方位划分
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

//! # 几何分类
//!
//! 将检测框映射为估计距离与粗略方位：
//!
//! - 距离：`K / (x2 - x1 + ε)`，框越宽物体越近；
//! - 方位：按 `floor(width / 3)` 把画面横向三等分，只看框的左边缘 `x1`。
//!
//! 两者都是纯函数，对任何框（包括零宽、倒置的框）都有定义。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// 默认标定常数（像素·米）
pub const DEFAULT_DISTANCE_SCALE: f64 = 500.0;
/// 防止零宽框除零的极小量
pub const DISTANCE_EPSILON: f64 = 1e-6;

#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
  #[error("距离标定常数必须为正的有限数, 实际为 {0}")]
  InvalidScale(f64),
}

/// 像素坐标系下的检测框 `(x1, y1, x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl BoundingBox {
  pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 由检测器输出的浮点坐标截断得到整数坐标
  pub fn from_xyxy(bbox: &[f32; 4]) -> Self {
    Self::new(
      bbox[0] as i32,
      bbox[1] as i32,
      bbox[2] as i32,
      bbox[3] as i32,
    )
  }

  /// 框宽度，倒置的框按 0 处理
  pub fn width(&self) -> u32 {
    (i64::from(self.x2) - i64::from(self.x1)).max(0) as u32
  }

  pub fn height(&self) -> u32 {
    (i64::from(self.y2) - i64::from(self.y1)).max(0) as u32
  }
}

/// 物体相对用户的粗略方位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bearing {
  Left,
  Forward,
  Right,
}

impl Bearing {
  /// 根据框左边缘所在的三等分区域确定方位
  pub fn from_left_edge(x1: i32, frame_width: u32) -> Self {
    let zone = i64::from(frame_width / 3);
    let x1 = i64::from(x1);
    if x1 < zone {
      Bearing::Left
    } else if x1 < 2 * zone {
      Bearing::Forward
    } else {
      Bearing::Right
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Bearing::Left => "LEFT",
      Bearing::Forward => "FORWARD",
      Bearing::Right => "RIGHT",
    }
  }
}

impl fmt::Display for Bearing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 四舍五入到 0.1，恰在中点时取偶数。
///
/// 先放大十倍再取整，是十进制舍入的近似：对于无法精确表示的中点
/// （例如 0.15 实际存储为 0.1499...），放大后的乘积会落在 1.5 上并进位为 0.2，
/// 而按存储值精确舍入应得 0.1。距离值 K / 宽度 的量级下可以忽略。
pub fn round_to_tenth(value: f64) -> f64 {
  (value * 10.0).round_ties_even() / 10.0
}

/// 四舍五入到最近的 0.5，恰在中点时取偶数
pub fn round_to_half(value: f64) -> f64 {
  (value * 2.0).round_ties_even() / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryClassifier {
  scale: f64,
}

impl Default for GeometryClassifier {
  fn default() -> Self {
    Self {
      scale: DEFAULT_DISTANCE_SCALE,
    }
  }
}

impl GeometryClassifier {
  pub fn new(scale: f64) -> Result<Self, GeometryError> {
    if !scale.is_finite() || scale <= 0.0 {
      return Err(GeometryError::InvalidScale(scale));
    }
    Ok(Self { scale })
  }

  pub fn scale(&self) -> f64 {
    self.scale
  }

  /// 未经取整的距离估计（米）
  pub fn raw_distance(&self, bbox: &BoundingBox) -> f64 {
    self.scale / (f64::from(bbox.width()) + DISTANCE_EPSILON)
  }

  /// 返回 `(保留一位小数的距离, 方位)`
  pub fn classify(&self, bbox: &BoundingBox, frame_width: u32) -> (f64, Bearing) {
    (
      round_to_tenth(self.raw_distance(bbox)),
      Bearing::from_left_edge(bbox.x1, frame_width),
    )
  }
}
