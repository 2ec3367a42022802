// 该文件是 Tanjing （探景） 项目的一部分。
// src/config.rs - 模型运行配置
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

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BLOB_WIDTH: u32 = 416;
pub const DEFAULT_BLOB_HEIGHT: u32 = 416;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.4;
pub const DEFAULT_MIN_OUTPUTS: usize = 2;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("输入尺寸无效: {width}x{height}")]
  InvalidBlobSize { width: u32, height: u32 },
  #[error("{name} 必须位于 [0, 1] 区间内, 实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("类别名称文件路径未设置")]
  MissingNamesPath,
}

/// 解码与抑制阶段共用的两个阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  /// 类别得分的最低保留值
  pub confidence: f32,
  /// 两个保留框之间允许的最大交并比
  pub overlap: f32,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE_THRESHOLD,
      overlap: DEFAULT_OVERLAP_THRESHOLD,
    }
  }
}

/// 一次运行的只读配置，启动时构建一次
#[derive(Debug, Clone)]
pub struct ModelConfig {
  names_path: PathBuf,
  blob_width: u32,
  blob_height: u32,
  thresholds: Thresholds,
  min_outputs: usize,
}

impl ModelConfig {
  pub fn builder() -> ModelConfigBuilder {
    ModelConfigBuilder::default()
  }

  pub fn names_path(&self) -> &std::path::Path {
    &self.names_path
  }

  pub fn blob_size(&self) -> (u32, u32) {
    (self.blob_width, self.blob_height)
  }

  pub fn thresholds(&self) -> Thresholds {
    self.thresholds
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.thresholds.confidence
  }

  pub fn overlap_threshold(&self) -> f32 {
    self.thresholds.overlap
  }

  /// 单张图像推理至少需要的输出张量个数
  pub fn min_outputs(&self) -> usize {
    self.min_outputs
  }
}

#[derive(Debug, Clone)]
pub struct ModelConfigBuilder {
  names_path: Option<PathBuf>,
  blob_width: u32,
  blob_height: u32,
  confidence_threshold: f32,
  overlap_threshold: f32,
  min_outputs: usize,
}

impl Default for ModelConfigBuilder {
  fn default() -> Self {
    Self {
      names_path: None,
      blob_width: DEFAULT_BLOB_WIDTH,
      blob_height: DEFAULT_BLOB_HEIGHT,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
      min_outputs: DEFAULT_MIN_OUTPUTS,
    }
  }
}

impl ModelConfigBuilder {
  pub fn names_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.names_path = Some(path.into());
    self
  }

  pub fn blob_size(mut self, width: u32, height: u32) -> Self {
    self.blob_width = width;
    self.blob_height = height;
    self
  }

  pub fn confidence_threshold(mut self, value: f32) -> Self {
    self.confidence_threshold = value;
    self
  }

  pub fn overlap_threshold(mut self, value: f32) -> Self {
    self.overlap_threshold = value;
    self
  }

  pub fn min_outputs(mut self, count: usize) -> Self {
    self.min_outputs = count;
    self
  }

  pub fn build(self) -> Result<ModelConfig, ConfigError> {
    if self.blob_width == 0 || self.blob_height == 0 {
      return Err(ConfigError::InvalidBlobSize {
        width: self.blob_width,
        height: self.blob_height,
      });
    }
    check_unit("confidence_threshold", self.confidence_threshold)?;
    check_unit("overlap_threshold", self.overlap_threshold)?;
    let names_path = self.names_path.ok_or(ConfigError::MissingNamesPath)?;

    let config = ModelConfig {
      names_path,
      blob_width: self.blob_width,
      blob_height: self.blob_height,
      thresholds: Thresholds {
        confidence: self.confidence_threshold,
        overlap: self.overlap_threshold,
      },
      min_outputs: self.min_outputs,
    };
    debug!("模型配置: {:?}", config);
    Ok(config)
  }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
  if value.is_finite() && (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::ThresholdOutOfRange { name, value })
  }
}
