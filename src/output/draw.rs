// 该文件是 Xunlu （寻路） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use url::Url;

use crate::alert::Detection;
use crate::frame::RgbFrame;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const TEXT_COLOR: [u8; 3] = [0, 0, 0];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件 {0}: {1}")]
  FontIoError(String, std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(String),
}

/// 在画面上绘制检测框和 `<label> - <distance>m` 标注。
///
/// 没有字体时只画框。
#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  font_size: f32,
  box_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      box_color: BOX_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)
      .map_err(|e| DrawError::FontIoError(path.display().to_string(), e))?;
    let font = FontArc::try_from_vec(data)
      .map_err(|_| DrawError::InvalidFont(path.display().to_string()))?;
    Ok(Self::default().with_font(font))
  }

  /// 读取输出 URL 中的 `font` 参数
  pub fn from_url(url: &Url) -> Result<Self, DrawError> {
    match url.query_pairs().find(|(k, _)| k == "font") {
      Some((_, path)) => Self::from_font_file(path.as_ref()),
      None => Ok(Self::default()),
    }
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 复制画面并绘制所有检测结果
  pub fn draw_detections(&self, frame: &RgbFrame, detections: &[Detection]) -> RgbImage {
    let mut image = frame.image().clone();
    for detection in detections {
      self.draw_detection(&mut image, detection);
    }
    image
  }

  fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let bbox = detection.bbox();
    let x_min = bbox.x1.clamp(0, w - 1);
    let y_min = bbox.y1.clamp(0, h - 1);
    let x_max = bbox.x2.clamp(0, w - 1);
    let y_max = bbox.y2.clamp(0, h - 1);
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 边框加粗，逐层向内收缩
    for thickness in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * thickness;
      let height = y_max - y_min - 2 * thickness;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + thickness, y_min + thickness).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.box_color));
    }

    let Some(font) = &self.font else {
      return;
    };

    let caption = detection.caption();
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, &caption);
    let label_height = text_height as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;

    // 标签放在框的上方，空间不够时放进框内
    let label_x = x_min;
    let label_y = if y_min >= label_height {
      y_min - label_height
    } else {
      y_min
    };
    let label_width = (text_width as i32).min(w - label_x);
    if label_width <= 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width as u32, label_height as u32);
    draw_filled_rect_mut(image, rect, Rgb(self.box_color));
    draw_text_mut(
      image,
      Rgb(TEXT_COLOR),
      label_x,
      label_y + LABEL_TEXT_VERTICAL_PADDING,
      scale,
      font,
      &caption,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::{Bearing, BoundingBox};

  fn person() -> Detection {
    Detection::new(
      "person",
      BoundingBox::new(10, 10, 30, 40),
      6.2,
      Bearing::Left,
    )
  }

  #[test]
  fn draws_box_outline_without_font() {
    let frame = RgbFrame::from(RgbImage::new(64, 64));
    let image = Draw::default().draw_detections(&frame, &[person()]);

    assert_eq!(image.get_pixel(10, 10), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(11, 20), &Rgb(BOX_COLOR));
    // 框内保持原样
    assert_eq!(image.get_pixel(20, 25), &Rgb([0, 0, 0]));
    // 原画面不受影响
    assert_eq!(frame.image().get_pixel(10, 10), &Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let frame = RgbFrame::from(RgbImage::new(16, 16));
    let inverted = Detection::new("cup", BoundingBox::new(12, 12, 4, 4), 1.0, Bearing::Right);
    let image = Draw::default().draw_detections(&frame, &[inverted]);
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn missing_font_is_reported() {
    let url = Url::parse("image:///tmp/out.png?font=/nonexistent/xunlu.ttf").unwrap();
    assert!(matches!(
      Draw::from_url(&url),
      Err(DrawError::FontIoError(_, _))
    ));
    let url = Url::parse("image:///tmp/out.png").unwrap();
    assert!(!Draw::from_url(&url).unwrap().has_font());
  }

  fn dejavu() -> FontArc {
    FontArc::try_from_slice(include_bytes!("../../assets/font.ttf")).unwrap()
  }

  #[test]
  fn caption_is_drawn_above_the_box() {
    let frame = RgbFrame::from(RgbImage::new(200, 100));
    let detection = Detection::new("person", BoundingBox::new(10, 40, 60, 90), 6.2, Bearing::Left);
    let draw = Draw::default().with_font(dejavu());
    let image = draw.draw_detections(&frame, &[detection.clone()]);

    let (text_width, text_height) = text_size(PxScale::from(LABEL_FONT_SIZE), &dejavu(), "person - 6.2m");
    assert!(text_width > 0);
    let label_height = text_height + 2 * LABEL_TEXT_VERTICAL_PADDING as u32;
    let label_top = 40 - label_height;

    // 标签背景在框上方
    assert_eq!(image.get_pixel(10, label_top), &Rgb(BOX_COLOR));
    // 背景上有文字
    let label_pixels = (label_top..40)
      .flat_map(|y| (10..10 + text_width).map(move |x| (x, y)))
      .map(|(x, y)| *image.get_pixel(x, y))
      .collect::<Vec<_>>();
    assert!(label_pixels.iter().any(|p| *p != Rgb(BOX_COLOR)));

    let plain = Draw::default().draw_detections(&frame, &[detection]);
    assert!((0..40).all(|y| *plain.get_pixel(10, y) == Rgb([0, 0, 0])));
  }

  #[test]
  fn font_loaded_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("label.ttf");
    std::fs::write(&path, include_bytes!("../../assets/font.ttf")).unwrap();
    let url = Url::parse(&format!("feed://?font={}", path.display())).unwrap();
    assert!(Draw::from_url(&url).unwrap().has_font());

    std::fs::write(&path, b"not a font").unwrap();
    assert!(matches!(
      Draw::from_url(&url),
      Err(DrawError::InvalidFont(_))
    ));
  }
}
