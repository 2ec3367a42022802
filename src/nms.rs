// 该文件是 Tanjing （探景） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::{bbox::BBox, model::CandidatePool};

/// 贪心非极大值抑制
///
/// 得分不低于 `score_threshold` 的框按得分降序稳定排序（同分保持原顺序），
/// 依次保留当前最高分的框，并剔除与其交并比大于 `overlap_threshold` 的框。
/// 不区分类别。返回值按抑制顺序排列，而不是原始顺序。
pub fn suppress(
  boxes: &[BBox],
  scores: &[f32],
  score_threshold: f32,
  overlap_threshold: f32,
) -> Vec<usize> {
  if boxes.len() != scores.len() {
    warn!(
      "边界框数量 {} 与得分数量 {} 不一致, 只处理公共部分",
      boxes.len(),
      scores.len()
    );
  }
  let count = boxes.len().min(scores.len());

  let mut order: Vec<usize> = (0..count)
    .filter(|&idx| scores[idx] >= score_threshold)
    .collect();
  order.sort_by(|&a, &b| {
    scores[b]
      .partial_cmp(&scores[a])
      .unwrap_or(Ordering::Equal)
  });

  let mut kept: Vec<usize> = Vec::with_capacity(order.len());
  for idx in order {
    let overlapped = kept
      .iter()
      .any(|&k| boxes[k].iou(&boxes[idx]) > overlap_threshold);
    if !overlapped {
      kept.push(idx);
    }
  }

  debug!("非极大值抑制: {} 个候选, 保留 {} 个", count, kept.len());
  kept
}

/// 对候选集合执行抑制
pub fn suppress_pool(
  pool: &CandidatePool,
  score_threshold: f32,
  overlap_threshold: f32,
) -> Vec<usize> {
  suppress(
    &pool.boxes(),
    &pool.scores(),
    score_threshold,
    overlap_threshold,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Candidate;

  #[test]
  fn identical_boxes_keep_the_strongest() {
    let boxes = [BBox::new(10, 10, 50, 50), BBox::new(10, 10, 50, 50)];
    assert_eq!(suppress(&boxes, &[0.8, 0.9], 0.3, 0.4), vec![1]);
  }

  #[test]
  fn output_is_in_score_order() {
    let boxes = [
      BBox::new(0, 0, 10, 10),
      BBox::new(100, 100, 10, 10),
      BBox::new(200, 200, 10, 10),
    ];
    assert_eq!(suppress(&boxes, &[0.5, 0.9, 0.7], 0.3, 0.4), vec![1, 2, 0]);
  }

  #[test]
  fn ties_keep_original_order() {
    let boxes = [
      BBox::new(0, 0, 10, 10),
      BBox::new(100, 100, 10, 10),
      BBox::new(200, 200, 10, 10),
    ];
    assert_eq!(suppress(&boxes, &[0.6, 0.6, 0.6], 0.3, 0.4), vec![0, 1, 2]);
  }

  #[test]
  fn overlap_equal_to_threshold_survives() {
    // 交并比恰好为 0.5
    let boxes = [BBox::new(0, 0, 30, 10), BBox::new(10, 0, 30, 10)];
    assert_eq!(suppress(&boxes, &[0.9, 0.8], 0.3, 0.5), vec![0, 1]);
    assert_eq!(suppress(&boxes, &[0.9, 0.8], 0.3, 0.49), vec![0]);
  }

  #[test]
  fn suppression_ignores_class() {
    let pool: CandidatePool = [
      Candidate {
        class_id: 0,
        confidence: 0.7,
        bbox: BBox::new(0, 0, 100, 100),
      },
      Candidate {
        class_id: 5,
        confidence: 0.95,
        bbox: BBox::new(5, 5, 100, 100),
      },
    ]
    .into_iter()
    .collect();
    assert_eq!(suppress_pool(&pool, 0.3, 0.4), vec![1]);
  }

  #[test]
  fn scores_below_threshold_are_dropped() {
    let boxes = [BBox::new(0, 0, 10, 10), BBox::new(50, 50, 10, 10)];
    assert_eq!(suppress(&boxes, &[0.2, 0.3], 0.3, 0.4), vec![1]);
  }

  #[test]
  fn extreme_decoded_boxes_do_not_panic() {
    use crate::{
      config::Thresholds,
      decode::decode_outputs,
      model::OutputTensor,
    };

    let tensor = OutputTensor::from_flat(
      vec![
        2.1e6, 0.5, 0.001, 0.1, 1.0, 0.9, //
        0.0, 0.5, -4e6, 0.1, 1.0, 0.8,
      ],
      6,
    );
    let thresholds = Thresholds {
      confidence: 0.3,
      overlap: 0.4,
    };
    let pool = decode_outputs(&[tensor], (1000, 1000), thresholds);
    assert_eq!(pool.len(), 2);
    assert_eq!(suppress_pool(&pool, 0.3, 0.4), vec![0, 1]);
  }

  #[test]
  fn empty_input() {
    assert!(suppress(&[], &[], 0.3, 0.4).is_empty());
  }

  #[test]
  fn mismatched_lengths_use_common_prefix() {
    let boxes = [BBox::new(0, 0, 10, 10), BBox::new(50, 50, 10, 10)];
    assert_eq!(suppress(&boxes, &[0.9], 0.3, 0.4), vec![0]);
  }
}
