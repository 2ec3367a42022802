// 该文件是 Tanjing （探景） 项目的一部分。
// src/labels.rs - 类别名称表
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

use thiserror::Error;
use tracing::{debug, info};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取类别名称文件 {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("类别索引 {class_id} 超出名称表范围 (共 {len} 个名称)")]
  OutOfRange { class_id: usize, len: usize },
}

/// 按类别索引排列的名称表，启动时加载一次
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNames {
  names: Box<[String]>,
}

impl ClassNames {
  /// 逐行读取名称文件，每一行对应一个类别
  pub fn read_lines(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("读取类别名称: {}", path.display());
    let bytes = std::fs::read(path).map_err(|source| LabelError::Io {
      path: path.display().to_string(),
      source,
    })?;
    // 非 UTF-8 字节替换为 U+FFFD，行数保持不变
    let names = Self::parse(&String::from_utf8_lossy(&bytes));
    debug!("共读取 {} 个类别名称", names.len());
    Ok(names)
  }

  /// 空行保留以维持索引对齐，末尾换行不产生额外条目
  pub fn parse(content: &str) -> Self {
    content
      .lines()
      .map(|line| line.trim_end_matches('\r').to_string())
      .collect()
  }

  pub fn coco() -> Self {
    COCO_CLASSES.iter().map(|name| name.to_string()).collect()
  }

  pub fn get(&self, class_id: usize) -> Result<&str, LabelError> {
    self
      .names
      .get(class_id)
      .map(String::as_str)
      .ok_or(LabelError::OutOfRange {
        class_id,
        len: self.names.len(),
      })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

impl FromIterator<String> for ClassNames {
  fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
    Self {
      names: iter.into_iter().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn parse_keeps_interior_blank_lines() {
    let names = ClassNames::parse("person\r\n\r\ncar\n");
    assert_eq!(names.len(), 3);
    assert_eq!(names.get(0).unwrap(), "person");
    assert_eq!(names.get(1).unwrap(), "");
    assert_eq!(names.get(2).unwrap(), "car");
  }

  #[test]
  fn out_of_range_is_an_error() {
    let names = ClassNames::parse("person\n");
    let err = names.get(3).unwrap_err();
    assert!(matches!(
      err,
      LabelError::OutOfRange {
        class_id: 3,
        len: 1
      }
    ));
  }

  #[test]
  fn read_lines_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "person").unwrap();
    writeln!(file, "bicycle").unwrap();
    let names = ClassNames::read_lines(file.path()).unwrap();
    assert_eq!(names.iter().collect::<Vec<_>>(), vec!["person", "bicycle"]);
  }

  #[test]
  fn read_lines_accepts_non_utf8_bytes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"person\ncaf\xe9\ndog\n").unwrap();
    let names = ClassNames::read_lines(file.path()).unwrap();
    assert_eq!(names.len(), 3);
    assert_eq!(names.get(1).unwrap(), "caf\u{fffd}");
    assert_eq!(names.get(2).unwrap(), "dog");
  }

  #[test]
  fn missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = ClassNames::read_lines(dir.path().join("absent.names")).unwrap_err();
    assert!(matches!(err, LabelError::Io { .. }));
  }

  #[test]
  fn coco_has_eighty_classes() {
    let names = ClassNames::coco();
    assert_eq!(names.len(), 80);
    assert_eq!(names.get(16).unwrap(), "dog");
  }
}
