// 该文件是 Tanjing （探景） 项目的一部分。
// src/decode.rs - 输出张量解码
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

use thiserror::Error;
use tracing::{debug, error};

use crate::{
  bbox::BBox,
  config::Thresholds,
  model::{Candidate, CandidatePool, OutputTensor, TENSOR_CLASS_OFFSET},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
  #[error("张量有 {rows} 行但数据为空")]
  NoData { rows: usize },
  #[error("张量行宽 {cols} 不足, 至少需要 {min} 列")]
  RowTooNarrow { cols: usize, min: usize },
  #[error("张量形状 {rows}x{cols} 与数据长度 {len} 不一致")]
  ShapeMismatch { rows: usize, cols: usize, len: usize },
}

/// 取类别得分中的最大值及其索引，相等时取靠前的类别
fn best_class(scores: &[f32]) -> Option<(usize, f32)> {
  scores
    .iter()
    .copied()
    .enumerate()
    .fold(None, |best, (idx, score)| match best {
      Some((_, best_score)) if best_score >= score => best,
      _ => Some((idx, score)),
    })
}

/// 解码单个输出张量，把得分不低于置信度阈值的行追加到 `pool`
///
/// `thresholds.overlap` 在这里不使用，留给抑制阶段。返回本张量新增的候选数。
pub fn decode_tensor(
  tensor: &OutputTensor,
  image_size: (u32, u32),
  thresholds: Thresholds,
  pool: &mut CandidatePool,
) -> Result<usize, DecodeError> {
  let (rows, cols) = (tensor.rows(), tensor.cols());
  if rows == 0 {
    return Ok(0);
  }

  let data = tensor.data();
  if data.is_empty() {
    return Err(DecodeError::NoData { rows });
  }
  if cols <= TENSOR_CLASS_OFFSET {
    return Err(DecodeError::RowTooNarrow {
      cols,
      min: TENSOR_CLASS_OFFSET + 1,
    });
  }
  if data.len() != rows * cols {
    return Err(DecodeError::ShapeMismatch {
      rows,
      cols,
      len: data.len(),
    });
  }

  let (image_width, image_height) = image_size;
  let before = pool.len();

  for row in data.chunks_exact(cols) {
    let Some((class_id, confidence)) = best_class(&row[TENSOR_CLASS_OFFSET..]) else {
      continue;
    };

    if confidence >= thresholds.confidence {
      let bbox = BBox::from_normalized_center(
        row[0],
        row[1],
        row[2],
        row[3],
        image_width,
        image_height,
      );
      pool.push(Candidate {
        class_id,
        confidence,
        bbox,
      });
    }
  }

  Ok(pool.len() - before)
}

/// 依次解码所有输出张量，某个张量出错时记录日志并继续处理其余张量
pub fn decode_outputs(
  outputs: &[OutputTensor],
  image_size: (u32, u32),
  thresholds: Thresholds,
) -> CandidatePool {
  let mut pool = CandidatePool::new();

  for (idx, tensor) in outputs.iter().enumerate() {
    match decode_tensor(tensor, image_size, thresholds, &mut pool) {
      Ok(count) => debug!("输出张量 {}: {} 行, 保留 {} 个候选", idx, tensor.rows(), count),
      Err(e) => error!("解码输出张量 {} 失败: {}", idx, e),
    }
  }

  pool
}

#[cfg(test)]
mod tests {
  use super::*;

  const THRESHOLDS: Thresholds = Thresholds {
    confidence: 0.5,
    overlap: 0.4,
  };

  fn row(cx: f32, cy: f32, w: f32, h: f32, scores: &[f32]) -> Vec<f32> {
    let mut row = vec![cx, cy, w, h, 1.0];
    row.extend_from_slice(scores);
    row
  }

  #[test]
  fn picks_the_best_class() {
    let tensor = OutputTensor::from_flat(row(0.5, 0.5, 0.2, 0.1, &[0.1, 0.7, 0.6]), 8);
    let mut pool = CandidatePool::new();
    assert_eq!(decode_tensor(&tensor, (416, 416), THRESHOLDS, &mut pool), Ok(1));
    let candidate = pool.get(0).unwrap();
    assert_eq!(candidate.class_id, 1);
    assert_eq!(candidate.confidence, 0.7);
    assert_eq!(candidate.bbox, BBox::new(166, 187, 83, 41));
  }

  #[test]
  fn score_at_threshold_is_kept() {
    let mut data = row(0.5, 0.5, 0.1, 0.1, &[0.5, 0.0]);
    data.extend(row(0.5, 0.5, 0.1, 0.1, &[0.0, 0.499_999]));
    let tensor = OutputTensor::from_flat(data, 7);
    let mut pool = CandidatePool::new();
    assert_eq!(decode_tensor(&tensor, (100, 100), THRESHOLDS, &mut pool), Ok(1));
    assert_eq!(pool.get(0).unwrap().class_id, 0);
  }

  #[test]
  fn equal_scores_choose_lowest_class() {
    assert_eq!(best_class(&[0.3, 0.8, 0.8]), Some((1, 0.8)));
    assert_eq!(best_class(&[]), None);
  }

  #[test]
  fn zero_rows_is_not_an_error() {
    let tensor = OutputTensor::empty(85);
    let mut pool = CandidatePool::new();
    assert_eq!(decode_tensor(&tensor, (416, 416), THRESHOLDS, &mut pool), Ok(0));
    assert!(pool.is_empty());
  }

  #[test]
  fn rows_without_storage_fail() {
    let tensor = OutputTensor::new(3, 85, Vec::new());
    let mut pool = CandidatePool::new();
    assert_eq!(
      decode_tensor(&tensor, (416, 416), THRESHOLDS, &mut pool),
      Err(DecodeError::NoData { rows: 3 })
    );
  }

  #[test]
  fn narrow_and_mismatched_tensors_fail() {
    let mut pool = CandidatePool::new();
    let narrow = OutputTensor::new(1, 5, vec![0.0; 5]);
    assert_eq!(
      decode_tensor(&narrow, (416, 416), THRESHOLDS, &mut pool),
      Err(DecodeError::RowTooNarrow { cols: 5, min: 6 })
    );
    let short = OutputTensor::new(2, 6, vec![0.0; 7]);
    assert_eq!(
      decode_tensor(&short, (416, 416), THRESHOLDS, &mut pool),
      Err(DecodeError::ShapeMismatch {
        rows: 2,
        cols: 6,
        len: 7
      })
    );
  }

  #[test]
  fn bad_tensor_keeps_other_candidates() {
    let good = OutputTensor::from_flat(row(0.5, 0.5, 0.2, 0.2, &[0.9]), 6);
    let bad = OutputTensor::new(4, 6, Vec::new());
    let late = OutputTensor::from_flat(row(0.25, 0.25, 0.1, 0.1, &[0.8]), 6);
    let pool = decode_outputs(&[good, bad, late], (100, 100), THRESHOLDS);
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.get(0).unwrap().confidence, 0.9);
    assert_eq!(pool.get(1).unwrap().confidence, 0.8);
  }
}
