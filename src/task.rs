// 该文件是 Tanjing （探景） 项目的一部分。
// src/task.rs - 检测任务
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::ModelConfig,
  decode::decode_outputs,
  frame::{Blob, BlobError},
  input::ImageFileInputError,
  labels::{ClassNames, LabelError},
  model::{DetectResult, Inference},
  nms::suppress_pool,
  output::Render,
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("读取图像失败: {0}")]
  Input(#[from] ImageFileInputError),
  #[error("创建 Blob 失败: {0}")]
  Blob(#[from] BlobError),
  #[error("推理失败: {0}")]
  Inference(#[source] BoxError),
  #[error("输出张量数量不足: 期望至少 {expected} 个, 实际 {actual} 个")]
  TooFewOutputs { expected: usize, actual: usize },
  #[error("输出失败: {0}")]
  Output(#[source] BoxError),
}

impl DetectError {
  /// 出错的处理阶段，用于日志
  pub fn stage(&self) -> &'static str {
    match self {
      DetectError::Input(_) => "input",
      DetectError::Blob(_) => "blob",
      DetectError::Inference(_) => "inference",
      DetectError::TooFewOutputs { .. } => "outputs",
      DetectError::Output(_) => "output",
    }
  }
}

/// 持有模型、配置与类别名称的检测器
pub struct Detector<M> {
  model: M,
  config: ModelConfig,
  names: ClassNames,
}

impl<M> Detector<M>
where
  M: Inference,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: M, config: ModelConfig, names: ClassNames) -> Self {
    debug!("模型输出层: {:?}", model.output_names());
    Self {
      model,
      config,
      names,
    }
  }

  /// 从配置中的路径读取类别名称，读取失败时不应继续处理任何图像
  pub fn from_config(model: M, config: ModelConfig) -> Result<Self, LabelError> {
    let names = ClassNames::read_lines(config.names_path())?;
    Ok(Self::new(model, config, names))
  }

  pub fn names(&self) -> &ClassNames {
    &self.names
  }

  /// 对单张图像执行 Blob 构建、推理、解码与抑制
  pub fn detect(&self, image: &RgbImage) -> Result<DetectResult, DetectError> {
    let (blob_width, blob_height) = self.config.blob_size();
    let blob = Blob::from_image(image, blob_width, blob_height)?;

    let outputs = self
      .model
      .run(&blob)
      .map_err(|e| DetectError::Inference(Box::new(e)))?;

    if outputs.len() < self.config.min_outputs() {
      return Err(DetectError::TooFewOutputs {
        expected: self.config.min_outputs(),
        actual: outputs.len(),
      });
    }

    let thresholds = self.config.thresholds();
    let candidates = decode_outputs(&outputs, image.dimensions(), thresholds);
    let kept = suppress_pool(&candidates, thresholds.confidence, thresholds.overlap);
    debug!("候选 {} 个, 保留 {} 个", candidates.len(), kept.len());

    Ok(DetectResult { candidates, kept })
  }
}

/// 一次批处理的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
  pub processed: usize,
  pub failed: usize,
  pub detections: usize,
  pub label_errors: usize,
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    detector: &Detector<M>,
    output: &O,
  ) -> Result<TaskSummary, Self::Error>;
}

/// 逐张处理图像，单张图像失败时记录日志并继续下一张
#[derive(Debug, Default)]
pub struct BatchTask;

impl BatchTask {
  fn process<M, O>(
    detector: &Detector<M>,
    output: &O,
    path: &Path,
    image: Result<RgbImage, ImageFileInputError>,
  ) -> Result<(usize, usize), DetectError>
  where
    M: Inference,
    M::Error: std::error::Error + Send + Sync + 'static,
    O: Render,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    let image = image?;
    let now = std::time::Instant::now();
    let result = detector.detect(&image)?;
    info!(
      "{}: 检测到 {} 个对象, 耗时 {:.2?}",
      path.display(),
      result.len(),
      now.elapsed()
    );

    let report = output
      .render_result(path, image, &result, detector.names())
      .map_err(|e| DetectError::Output(Box::new(e)))?;
    Ok((result.len(), report.label_errors))
  }
}

impl<I, M, O> Task<I, M, O> for BatchTask
where
  I: Iterator<Item = (PathBuf, Result<RgbImage, ImageFileInputError>)>,
  M: Inference,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    detector: &Detector<M>,
    output: &O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let mut summary = TaskSummary::default();

    for (path, image) in input {
      match Self::process(detector, output, &path, image) {
        Ok((detections, label_errors)) => {
          summary.processed += 1;
          summary.detections += detections;
          summary.label_errors += label_errors;
        }
        Err(e) => {
          error!("[{}] {}: {}", e.stage(), path.display(), e);
          summary.failed += 1;
        }
      }
    }

    if summary.failed > 0 {
      warn!("{} 张图像处理失败", summary.failed);
    }
    info!(
      "任务完成: 成功 {} 张, 失败 {} 张, 共检测 {} 个对象",
      summary.processed, summary.failed, summary.detections
    );
    Ok(summary)
  }
}
