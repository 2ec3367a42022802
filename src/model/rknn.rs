// 该文件是 Tanjing （探景） 项目的一部分。
// src/model/rknn.rs - RKNN 推理后端
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Blob,
  model::{Inference, OutputTensor, TENSOR_CLASS_OFFSET},
};

const RKNN_NUM_INPUTS: u32 = 1;
// COCO: 5 + 80
const RKNN_DEFAULT_ROW_WIDTH: usize = 85;

#[derive(Error, Debug)]
pub enum RknnError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("获取第 {0} 个输出失败: {1}")]
  OutputError(usize, String),
}

impl From<std::io::Error> for RknnError {
  fn from(err: std::io::Error) -> Self {
    RknnError::ModelLoadError(err)
  }
}

impl From<rknpu::Error> for RknnError {
  fn from(err: rknpu::Error) -> Self {
    RknnError::RknnError(err)
  }
}

impl RknnError {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    RknnError::ModelInvalid(msg.to_string(), e)
  }
}

pub struct RknnModel {
  context: Context,
  output_names: Box<[String]>,
  row_width: usize,
}

pub struct RknnModelBuilder {
  model_path: String,
  row_width: usize,
  flags: InitFlags,
}

impl FromUrlWithScheme for RknnModelBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnModelBuilder {
  type Error = RknnError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut row_width = RKNN_DEFAULT_ROW_WIDTH;
    for (key, value) in url.query_pairs() {
      if key == "row_width" {
        row_width = value
          .parse()
          .map_err(|_| RknnError::ModelPathError(format!("无效的行宽: {}", value)))?;
      }
    }

    if row_width <= TENSOR_CLASS_OFFSET {
      return Err(RknnError::ModelPathError(format!(
        "行宽必须大于 {}, 实际为 {}",
        TENSOR_CLASS_OFFSET, row_width
      )));
    }

    Ok(RknnModelBuilder {
      model_path: url.path().to_string(),
      row_width,
      flags: InitFlags::default(),
    })
  }
}

impl RknnModelBuilder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn build(self) -> Result<RknnModel, RknnError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, self.flags)?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(RknnError::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| RknnError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| RknnError::invalid("无法获取输出数量", e))?;

    if num_inputs != RKNN_NUM_INPUTS {
      let msg = format!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNN_NUM_INPUTS, num_inputs
      );
      error!("{}", msg);
      return Err(RknnError::invalid(&msg, rknpu::Error::InvalidModel));
    }

    // 输出层名称只在这里计算一次
    let output_names: Box<[String]> = (0..num_outputs).map(|i| format!("output{}", i)).collect();
    debug!("模型输出层: {:?}", output_names);
    info!("模型加载完成");

    Ok(RknnModel {
      context,
      output_names,
      row_width: self.row_width,
    })
  }
}

impl Inference for RknnModel {
  type Error = RknnError;

  fn output_names(&self) -> &[String] {
    &self.output_names
  }

  fn run(&self, blob: &Blob) -> Result<Vec<OutputTensor>, Self::Error> {
    debug!("设置模型输入");
    self
      .context
      .set_input(0, blob.as_nhwc(), TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    debug!("获取模型输出");
    let output = self.context.get_outputs()?;

    let mut tensors = Vec::with_capacity(self.output_names.len());
    for (idx, name) in self.output_names.iter().enumerate() {
      let data = output
        .get_f32(idx)
        .map_err(|e| RknnError::OutputError(idx, e.to_string()))?;
      let tensor = OutputTensor::from_flat(data.to_vec(), self.row_width);
      debug!("输出层 {}: {} 行 x {} 列", name, tensor.rows(), tensor.cols());
      tensors.push(tensor);
    }

    Ok(tensors)
  }
}
