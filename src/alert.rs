// 该文件是 Xunlu （寻路） 项目的一部分。
// src/alert.rs - 检测告警数据模型
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

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::SerializeTuple;

use crate::geometry::{Bearing, BoundingBox, round_to_half};

/// 单帧中识别出的一个物体，构造后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  label: String,
  bbox: BoundingBox,
  distance_meters: f64,
  bearing: Bearing,
}

impl Detection {
  pub fn new(
    label: impl Into<String>,
    bbox: BoundingBox,
    distance_meters: f64,
    bearing: Bearing,
  ) -> Self {
    Self {
      label: label.into(),
      bbox,
      distance_meters,
      bearing,
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn bbox(&self) -> &BoundingBox {
    &self.bbox
  }

  pub fn distance_meters(&self) -> f64 {
    self.distance_meters
  }

  pub fn bearing(&self) -> Bearing {
    self.bearing
  }

  /// 播报用的距离文本
  pub fn spoken_distance(&self) -> String {
    format_spoken_distance(self.distance_meters)
  }

  /// 播报语句：`<label> is <distance> meters on <bearing>`
  pub fn utterance(&self) -> String {
    format!(
      "{} is {} meters on {}",
      self.label,
      self.spoken_distance(),
      self.bearing
    )
  }

  /// 画面标注文本
  pub fn caption(&self) -> String {
    format!("{} - {:.1}m", self.label, self.distance_meters)
  }
}

/// 以 `[label, distance, bearing]` 三元组序列化，与网页端读取的格式一致
impl Serialize for Detection {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut tuple = serializer.serialize_tuple(3)?;
    tuple.serialize_element(&self.label)?;
    tuple.serialize_element(&self.distance_meters)?;
    tuple.serialize_element(&self.bearing)?;
    tuple.end()
  }
}

/// 距离取整到 0.5；整数不带小数位，否则保留一位
pub fn format_spoken_distance(distance_meters: f64) -> String {
  let rounded = round_to_half(distance_meters);
  if rounded.fract() == 0.0 {
    format!("{:.0}", rounded)
  } else {
    format!("{:.1}", rounded)
  }
}

/// 同一帧的全部检测结果，按检测器输出顺序排列，且至少包含一个物体
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionBatch {
  frame_index: u64,
  captured_at: DateTime<Utc>,
  detections: Vec<Detection>,
}

impl DetectionBatch {
  /// 空检测列表不构成批次
  pub fn new(frame_index: u64, detections: Vec<Detection>) -> Option<Self> {
    if detections.is_empty() {
      return None;
    }
    Some(Self {
      frame_index,
      captured_at: Utc::now(),
      detections,
    })
  }

  pub fn frame_index(&self) -> u64 {
    self.frame_index
  }

  pub fn captured_at(&self) -> DateTime<Utc> {
    self.captured_at
  }

  pub fn detections(&self) -> &[Detection] {
    &self.detections
  }

  pub fn len(&self) -> usize {
    self.detections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.detections.iter()
  }
}

impl IntoIterator for DetectionBatch {
  type Item = Detection;
  type IntoIter = std::vec::IntoIter<Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.detections.into_iter()
  }
}

impl<'a> IntoIterator for &'a DetectionBatch {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.detections.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn person_left() -> Detection {
    Detection::new("person", BoundingBox::new(100, 50, 180, 300), 6.2, Bearing::Left)
  }

  #[test]
  fn spoken_distance_drops_integral_decimal() {
    assert_eq!(format_spoken_distance(3.3), "3.5");
    assert_eq!(format_spoken_distance(3.7), "3.5");
    assert_eq!(format_spoken_distance(3.76), "4");
    assert_eq!(format_spoken_distance(3.0), "3");
    assert_eq!(format_spoken_distance(0.1), "0");
  }

  #[test]
  fn utterance_follows_template() {
    assert_eq!(person_left().utterance(), "person is 6 meters on LEFT");
    let chair = Detection::new("chair", BoundingBox::new(400, 0, 540, 80), 3.6, Bearing::Forward);
    assert_eq!(chair.utterance(), "chair is 3.5 meters on FORWARD");
  }

  #[test]
  fn caption_keeps_one_decimal() {
    assert_eq!(person_left().caption(), "person - 6.2m");
  }

  #[test]
  fn empty_frames_produce_no_batch() {
    assert!(DetectionBatch::new(3, Vec::new()).is_none());
    let batch = DetectionBatch::new(3, vec![person_left()]).unwrap();
    assert_eq!(batch.frame_index(), 3);
    assert_eq!(batch.len(), 1);
    assert!(!batch.is_empty());
  }

  #[test]
  fn detection_serializes_as_triple() {
    let json = serde_json::to_string(&person_left()).unwrap();
    assert_eq!(json, r#"["person",6.2,"LEFT"]"#);
  }
}
