// 该文件是 Xunlu （寻路） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod alert;
pub mod announcer;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod model;
pub mod output;
pub mod perception;
pub mod queue;
pub mod speech;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 从 URL 查询参数中读取并解析一个值，缺失时返回 `None`
pub(crate) fn query_value<T: std::str::FromStr>(url: &url::Url, key: &str) -> Option<T> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .and_then(|(_, v)| v.parse().ok())
}

/// URL 路径部分按百分号编码解码，失败时原样返回
pub(crate) fn decoded_path(url: &url::Url) -> String {
  let path = url.path();
  urlencoding::decode(path)
    .map(|p| p.into_owned())
    .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn query_value_parses_known_keys() {
    let url = url::Url::parse("espeak://?rate=180&volume=0.5").unwrap();
    assert_eq!(query_value::<u32>(&url, "rate"), Some(180));
    assert_eq!(query_value::<f32>(&url, "volume"), Some(0.5));
    assert_eq!(query_value::<u32>(&url, "pitch"), None);
  }

  #[test]
  fn decoded_path_handles_spaces() {
    let url = url::Url::parse("image:///tmp/my%20frame.png").unwrap();
    assert_eq!(decoded_path(&url), "/tmp/my frame.png");
  }
}
