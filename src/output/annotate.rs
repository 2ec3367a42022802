// 该文件是 Tanjing （探景） 项目的一部分。
// src/output/annotate.rs - 检测框与标签绘制
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  bbox::BBox,
  labels::{ClassNames, LabelError},
  model::{Candidate, CandidatePool, DetectResult},
};

const LABEL_FONT_SIZE: f32 = 16.0;
const ANNOTATION_COLOR: [u8; 3] = [255, 255, 255];

#[derive(Error, Debug)]
pub enum AnnotateError {
  #[error("无法加载字体: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
  #[error("候选索引 {index} 超出范围 (共 {len} 个候选)")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("候选 {index} 的类别名称查找失败: {source}")]
  ClassOutOfRange {
    index: usize,
    #[source]
    source: LabelError,
  },
}

/// 单个候选的绘制结果
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
  pub index: usize,
  pub boxed: bool,
  pub label: Option<String>,
}

/// 一张图像的绘制统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotateReport {
  pub boxes: usize,
  pub labels: usize,
  pub label_errors: usize,
}

/// 组合标签文本 `"<类别名>, <置信度>"`
pub fn label_for(candidate: &Candidate, names: &ClassNames) -> Result<String, LabelError> {
  let name = names.get(candidate.class_id)?;
  Ok(format!("{}, {:.2}", name, candidate.confidence))
}

fn pixel_limits((width, height): (u32, u32)) -> (i32, i32) {
  (
    width.min(i32::MAX as u32) as i32,
    height.min(i32::MAX as u32) as i32,
  )
}

/// 将边框裁剪到图像外扩一像素的范围内，落在图像外的边不会被绘制
fn clip_to_image(bbox: &BBox, dimensions: (u32, u32)) -> Option<Rect> {
  let (width, height) = dimensions;
  let left = (bbox.x as i64).max(-1);
  let top = (bbox.y as i64).max(-1);
  let right = (bbox.x as i64 + bbox.width as i64).min(width as i64 + 1);
  let bottom = (bbox.y as i64 + bbox.height as i64).min(height as i64 + 1);
  if right <= left || bottom <= top {
    return None;
  }
  Some(Rect::at(left as i32, top as i32).of_size((right - left) as u32, (bottom - top) as u32))
}

pub struct Annotator {
  font: FontArc,
  font_scale: PxScale,
  color: Rgb<u8>,
}

impl Annotator {
  pub fn new() -> Result<Self, AnnotateError> {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;

    Ok(Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      color: Rgb(ANNOTATION_COLOR),
    })
  }

  pub fn with_font_size(mut self, size: f32) -> Self {
    self.font_scale = PxScale::from(size);
    self
  }

  /// 绘制 `pool[index]` 的边框，名称表非空时再绘制标签
  ///
  /// 类别越界时边框照常绘制，标签跳过并返回 [`AnnotateError::ClassOutOfRange`]。
  pub fn annotate(
    &self,
    image: &mut RgbImage,
    index: usize,
    pool: &CandidatePool,
    names: &ClassNames,
  ) -> Result<Annotation, AnnotateError> {
    let candidate = pool.get(index).ok_or(AnnotateError::IndexOutOfRange {
      index,
      len: pool.len(),
    })?;
    let bbox = candidate.bbox;

    let boxed = if bbox.is_empty() {
      warn!("候选 {} 的边界框退化: {:?}, 跳过绘制", index, bbox);
      false
    } else if let Some(rect) = clip_to_image(&bbox, image.dimensions()) {
      draw_hollow_rect_mut(image, rect, self.color);
      true
    } else {
      warn!("候选 {} 的边界框位于图像之外: {:?}, 跳过绘制", index, bbox);
      false
    };

    if names.is_empty() {
      info!("未解析到类别名称, 跳过标签");
      return Ok(Annotation {
        index,
        boxed,
        label: None,
      });
    }

    let label = label_for(candidate, names)
      .map_err(|source| AnnotateError::ClassOutOfRange { index, source })?;
    info!("{}", label);

    // 文本基线落在边框左上角，并限制在图像范围内
    let (_, text_height) = text_size(self.font_scale, &self.font, &label);
    let (max_x, max_y) = pixel_limits(image.dimensions());
    let text_x = bbox.x.clamp(0, max_x);
    let text_y = bbox
      .y
      .saturating_sub(text_height.min(i32::MAX as u32) as i32)
      .clamp(0, max_y);
    draw_text_mut(
      image,
      self.color,
      text_x,
      text_y,
      self.font_scale,
      &self.font,
      &label,
    );

    Ok(Annotation {
      index,
      boxed,
      label: Some(label),
    })
  }

  /// 绘制所有保留下来的候选，单个候选失败不影响其余候选
  pub fn annotate_all(
    &self,
    image: &mut RgbImage,
    result: &DetectResult,
    names: &ClassNames,
  ) -> AnnotateReport {
    let mut report = AnnotateReport::default();

    for &index in result.kept.iter() {
      match self.annotate(image, index, &result.candidates, names) {
        Ok(annotation) => {
          report.boxes += annotation.boxed as usize;
          report.labels += annotation.label.is_some() as usize;
        }
        Err(AnnotateError::ClassOutOfRange { index, source }) => {
          error!("候选 {} 标签绘制失败: {}", index, source);
          let dimensions = image.dimensions();
          let boxed = result
            .candidates
            .get(index)
            .is_some_and(|c| clip_to_image(&c.bbox, dimensions).is_some());
          report.boxes += boxed as usize;
          report.label_errors += 1;
        }
        Err(e) => {
          error!("候选 {} 绘制失败: {}", index, e);
          report.label_errors += 1;
        }
      }
    }

    report
  }
}
