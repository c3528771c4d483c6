// 该文件是 Xunlu （寻路） 项目的一部分。
// src/main.rs - 项目主程序
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

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use xunlu::{
  FromUrl,
  geometry::{DEFAULT_DISTANCE_SCALE, GeometryClassifier},
  input::InputWrapper,
  model::ReplayDetector,
  output::OutputWrapper,
  perception::DEFAULT_MIN_CONFIDENCE,
  speech::SpeechWrapper,
  task::{AlertTask, Task},
};

/// Xunlu 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测结果来源，例如 replay:///path/to/detections.jsonl
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源：image://、folder:// 或 v4l://
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 画面输出：image://、folder:// 或 none://
  #[arg(long, value_name = "OUTPUT", default_value = "none://")]
  pub output: Url,
  /// 语音引擎：espeak:// 或 log://
  #[arg(long, value_name = "SPEECH", default_value = "espeak://")]
  pub speech: Url,
  /// 距离系数 K，距离 = K / 检测框宽度
  #[arg(long, value_name = "K", default_value_t = DEFAULT_DISTANCE_SCALE)]
  pub distance_scale: f64,
  /// 置信度阈值
  #[arg(long, value_name = "THRESHOLD", default_value_t = DEFAULT_MIN_CONFIDENCE)]
  pub confidence: f32,
  /// 检测前水平翻转画面
  #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
  pub mirror: bool,
  /// 标注字体文件
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 播报线程空闲等待间隔（毫秒）
  #[arg(long, value_name = "MS", default_value_t = 100)]
  pub idle_ms: u64,
  /// 处理的帧数，0 表示不限制
  #[arg(long, value_name = "FRAME_NUMBER", default_value_t = 0)]
  pub frame_number: u64,
}

/// `--font` 作为输出 URL 的 `font` 参数，URL 中已有时不覆盖
fn output_url(args: &Args) -> Url {
  let mut url = args.output.clone();
  if let Some(font) = &args.font
    && !url.query_pairs().any(|(k, _)| k == "font")
  {
    url
      .query_pairs_mut()
      .append_pair("font", &font.to_string_lossy());
  }
  url
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测结果来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("语音引擎: {}", args.speech);

  let classifier = GeometryClassifier::new(args.distance_scale)?;
  let input = InputWrapper::from_url(&args.input)?;
  let model = ReplayDetector::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&output_url(&args))?;
  let speech = SpeechWrapper::from_url(&args.speech)?;

  let frame_number = (args.frame_number > 0).then_some(args.frame_number);
  AlertTask::default()
    .with_classifier(classifier)
    .with_min_confidence(args.confidence)
    .with_mirror(args.mirror)
    .with_idle(Duration::from_millis(args.idle_ms))
    .with_frame_number(frame_number)
    .run_task(input, model, output, speech)
}
