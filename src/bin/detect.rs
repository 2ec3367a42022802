// 该文件是 Tanjing （探景） 项目的一部分。
// src/bin/detect.rs - 批量图像检测
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

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use tanjing::{
  BatchTask, Detector, FromUrl, ModelConfig, Task,
  config::{
    DEFAULT_BLOB_HEIGHT, DEFAULT_BLOB_WIDTH, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_OUTPUTS,
    DEFAULT_OVERLAP_THRESHOLD,
  },
  input::ImageFileInput,
  model::RknnModelBuilder,
  output::SaveImageFileOutput,
};
use tracing::{info, warn};

/// Tanjing 检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型路径，例如 rknn:///models/yolov3.rknn?row_width=85
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 类别名称文件，每行一个名称
  #[arg(long, value_name = "FILE")]
  pub names: PathBuf,
  /// 输出目录，例如 dir:///tmp/out?record=json&font_size=16
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 网络输入宽度
  #[arg(long, default_value_t = DEFAULT_BLOB_WIDTH)]
  pub blob_width: u32,
  /// 网络输入高度
  #[arg(long, default_value_t = DEFAULT_BLOB_HEIGHT)]
  pub blob_height: u32,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,
  /// 重叠（IoU）阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_OVERLAP_THRESHOLD, value_name = "THRESHOLD")]
  pub overlap: f32,
  /// 每张图像至少需要的输出张量个数
  #[arg(long, default_value_t = DEFAULT_MIN_OUTPUTS, value_name = "COUNT")]
  pub min_outputs: usize,
  /// 待检测的图像文件
  #[arg(required = true, value_name = "IMAGES")]
  pub images: Vec<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("类别名称文件: {}", args.names.display());
  info!("输出路径: {}", args.output);

  let config = ModelConfig::builder()
    .names_path(&args.names)
    .blob_size(args.blob_width, args.blob_height)
    .confidence_threshold(args.confidence)
    .overlap_threshold(args.overlap)
    .min_outputs(args.min_outputs)
    .build()?;

  let model = RknnModelBuilder::from_url(&args.model)?
    .build()
    .context("无法初始化网络")?;
  let detector = Detector::from_config(model, config).context("无法读取类别名称")?;
  let output = SaveImageFileOutput::from_url(&args.output)?;

  let input = ImageFileInput::new(args.images);
  let summary = BatchTask.run_task(input, &detector, &output)?;

  if summary.label_errors > 0 {
    warn!("{} 个标签的类别索引超出名称表范围", summary.label_errors);
  }
  info!("{:?}", summary);

  Ok(())
}
