// 该文件是 Tanjing （探景） 项目的一部分。
// src/output/record.rs - 检测结果记录
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

use std::path::{Path, PathBuf};

use serde_json::json;

use crate::{labels::ClassNames, model::DetectResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
  /// 每行 `名称, 得分, x, y, w, h`
  Name,
  /// 每行 `类别索引, 得分, x, y, w, h`
  Id,
  /// JSON 数组
  Json,
}

impl RecordKind {
  pub fn parse(kind: &str) -> Option<Self> {
    match kind {
      "name" => Some(RecordKind::Name),
      "id" => Some(RecordKind::Id),
      "json" => Some(RecordKind::Json),
      _ => None,
    }
  }

  fn extension(&self) -> &'static str {
    match self {
      RecordKind::Name | RecordKind::Id => "txt",
      RecordKind::Json => "json",
    }
  }
}

pub struct Record {
  pub kind: RecordKind,
}

impl Record {
  /// 名称缺失时退回类别索引
  fn class_text(&self, class_id: usize, names: &ClassNames) -> String {
    match self.kind {
      RecordKind::Id => class_id.to_string(),
      _ => names
        .get(class_id)
        .map(str::to_string)
        .unwrap_or_else(|_| class_id.to_string()),
    }
  }

  pub fn render(&self, result: &DetectResult, names: &ClassNames) -> String {
    if self.kind == RecordKind::Json {
      let items: Vec<_> = result
        .detections()
        .map(|item| {
          json!({
            "class_id": item.class_id,
            "class_name": names.get(item.class_id).ok(),
            "score": item.confidence,
            "bbox": [item.bbox.x, item.bbox.y, item.bbox.width, item.bbox.height],
          })
        })
        .collect();
      return serde_json::Value::Array(items).to_string();
    }

    result
      .detections()
      .map(|item| {
        format!(
          "{}, {:.4}, {}, {}, {}, {}",
          self.class_text(item.class_id, names),
          item.confidence,
          item.bbox.x,
          item.bbox.y,
          item.bbox.width,
          item.bbox.height
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub fn record(
    &self,
    result: &DetectResult,
    names: &ClassNames,
    path: &Path,
  ) -> Result<PathBuf, std::io::Error> {
    let path = path.with_extension(self.kind.extension());
    std::fs::write(&path, self.render(result, names))?;
    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bbox::BBox;
  use crate::model::{Candidate, CandidatePool};

  fn result() -> DetectResult {
    let candidates: CandidatePool = [
      Candidate {
        class_id: 0,
        confidence: 0.5,
        bbox: BBox::new(1, 2, 3, 4),
      },
      Candidate {
        class_id: 3,
        confidence: 0.75,
        bbox: BBox::new(5, 6, 7, 8),
      },
    ]
    .into_iter()
    .collect();
    DetectResult {
      candidates,
      kept: vec![1, 0],
    }
  }

  #[test]
  fn name_records_fall_back_to_ids() {
    let record = Record {
      kind: RecordKind::Name,
    };
    let names = ClassNames::parse("person\n");
    assert_eq!(
      record.render(&result(), &names),
      "3, 0.7500, 5, 6, 7, 8\nperson, 0.5000, 1, 2, 3, 4"
    );
  }

  #[test]
  fn json_records_keep_order() {
    let record = Record {
      kind: RecordKind::Json,
    };
    let names = ClassNames::parse("person\n");
    let value: serde_json::Value =
      serde_json::from_str(&record.render(&result(), &names)).unwrap();
    assert_eq!(value[0]["class_id"], 3);
    assert!(value[0]["class_name"].is_null());
    assert_eq!(value[1]["class_name"], "person");
    assert_eq!(value[1]["bbox"], json!([1, 2, 3, 4]));
  }

  #[test]
  fn kinds_parse() {
    assert_eq!(RecordKind::parse("id"), Some(RecordKind::Id));
    assert_eq!(RecordKind::parse("xml"), None);
  }
}
