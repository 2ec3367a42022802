// 该文件是 Tanjing （探景） 项目的一部分。
// src/model.rs - 模型
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

use crate::{bbox::BBox, frame::Blob};

/// 推理后端，输出层名称在模型构建时确定并由模型实例持有
pub trait Inference {
  type Error;

  fn output_names(&self) -> &[String];
  fn run(&self, blob: &Blob) -> Result<Vec<OutputTensor>, Self::Error>;
}

/// 每行前 5 列为 `[cx, cy, w, h, objectness]`，其后为各类别得分
pub const TENSOR_CLASS_OFFSET: usize = 5;

/// 单个输出层的二维检测网格
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  rows: usize,
  cols: usize,
  data: Box<[f32]>,
}

impl OutputTensor {
  /// 不检查 `data` 的长度，形状问题在解码阶段报告
  pub fn new(rows: usize, cols: usize, data: impl Into<Box<[f32]>>) -> Self {
    Self {
      rows,
      cols,
      data: data.into(),
    }
  }

  /// 按固定行宽切分扁平数据，尾部不足一行的部分被丢弃
  pub fn from_flat(mut data: Vec<f32>, cols: usize) -> Self {
    let rows = if cols == 0 { 0 } else { data.len() / cols };
    data.truncate(rows * cols);
    Self::new(rows, cols, data)
  }

  pub fn empty(cols: usize) -> Self {
    Self::new(0, cols, Vec::new())
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }
}

/// 解码阶段产生的候选检测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub class_id: usize,
  pub confidence: f32,
  pub bbox: BBox,
}

/// 所有输出层的候选按顺序汇总在一起
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
  items: Vec<Candidate>,
}

impl CandidatePool {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, candidate: Candidate) {
    self.items.push(candidate);
  }

  pub fn get(&self, index: usize) -> Option<&Candidate> {
    self.items.get(index)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn as_slice(&self) -> &[Candidate] {
    &self.items
  }

  pub fn boxes(&self) -> Vec<BBox> {
    self.items.iter().map(|c| c.bbox).collect()
  }

  pub fn scores(&self) -> Vec<f32> {
    self.items.iter().map(|c| c.confidence).collect()
  }
}

impl FromIterator<Candidate> for CandidatePool {
  fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
    Self {
      items: iter.into_iter().collect(),
    }
  }
}

/// 单张图像的检测结果：候选集合与抑制后保留的索引
#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub candidates: CandidatePool,
  pub kept: Vec<usize>,
}

impl DetectResult {
  /// 按抑制顺序迭代保留下来的候选
  pub fn detections(&self) -> impl Iterator<Item = &Candidate> {
    self.kept.iter().filter_map(|&idx| self.candidates.get(idx))
  }

  pub fn len(&self) -> usize {
    self.kept.len()
  }

  pub fn is_empty(&self) -> bool {
    self.kept.is_empty()
  }
}

#[cfg(feature = "rknpu")]
mod rknn;
#[cfg(feature = "rknpu")]
pub use self::rknn::{RknnError, RknnModel, RknnModelBuilder};
