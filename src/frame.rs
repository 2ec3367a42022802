// 该文件是 Tanjing （探景） 项目的一部分。
// src/frame.rs - 网络输入 Blob
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

use image::RgbImage;
use image::imageops::{self, FilterType};
use thiserror::Error;
use tracing::debug;

const RGB_CHANNELS: usize = 3;
const PIXEL_SCALE: f32 = 1.0 / 255.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlobError {
  #[error("输入图像为空: {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
  #[error("目标尺寸无效: {width}x{height}")]
  InvalidSize { width: u32, height: u32 },
}

/// 缩放并归一化后的网络输入
#[derive(Debug, Clone)]
pub struct Blob {
  width: u32,
  height: u32,
  nhwc: Box<[u8]>,
}

impl Blob {
  /// 将图像缩放到 `width x height`，保留 NHWC 字节
  pub fn from_image(image: &RgbImage, width: u32, height: u32) -> Result<Self, BlobError> {
    if image.width() == 0 || image.height() == 0 {
      return Err(BlobError::EmptyImage {
        width: image.width(),
        height: image.height(),
      });
    }
    if width == 0 || height == 0 {
      return Err(BlobError::InvalidSize { width, height });
    }

    let resized = if image.dimensions() == (width, height) {
      image.clone()
    } else {
      imageops::resize(image, width, height, FilterType::Triangle)
    };

    debug!(
      "构建 Blob: {}x{} -> {}x{}",
      image.width(),
      image.height(),
      width,
      height
    );

    Ok(Self {
      width,
      height,
      nhwc: resized.into_raw().into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  /// 按 1/255 归一化为 `[1, 3, H, W]` 排布的浮点数据，供浮点输入的后端使用
  ///
  /// 每次调用都重新计算，字节输入的后端不必承担这部分开销。
  pub fn to_nchw(&self) -> Vec<f32> {
    let plane = self.nhwc.len() / RGB_CHANNELS;
    let mut nchw = vec![0f32; plane * RGB_CHANNELS];
    for (idx, pixel) in self.nhwc.chunks_exact(RGB_CHANNELS).enumerate() {
      for (c, &value) in pixel.iter().enumerate() {
        nchw[c * plane + idx] = value as f32 * PIXEL_SCALE;
      }
    }
    nchw
  }

  /// `[1, H, W, 3]` 排布的原始字节
  pub fn as_nhwc(&self) -> &[u8] {
    &self.nhwc
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn scales_pixels_into_unit_range() {
    let image = RgbImage::from_pixel(4, 2, Rgb([255, 0, 51]));
    let blob = Blob::from_image(&image, 4, 2).unwrap();
    let plane = 8;
    let nchw = blob.to_nchw();
    assert_eq!(nchw.len(), plane * 3);
    assert!((nchw[0] - 1.0).abs() < 1e-6);
    assert_eq!(nchw[plane], 0.0);
    assert!((nchw[2 * plane] - 0.2).abs() < 1e-6);
    assert_eq!(&blob.as_nhwc()[..3], &[255, 0, 51]);
  }

  #[test]
  fn resizes_to_target() {
    let image = RgbImage::from_pixel(20, 10, Rgb([10, 20, 30]));
    let blob = Blob::from_image(&image, 8, 8).unwrap();
    assert_eq!((blob.width(), blob.height()), (8, 8));
    assert_eq!(blob.as_nhwc().len(), 8 * 8 * 3);
  }

  #[test]
  fn empty_image_is_rejected() {
    let image = RgbImage::new(0, 0);
    assert_eq!(
      Blob::from_image(&image, 416, 416).unwrap_err(),
      BlobError::EmptyImage {
        width: 0,
        height: 0
      }
    );
  }

  #[test]
  fn zero_target_is_rejected() {
    let image = RgbImage::new(4, 4);
    assert_eq!(
      Blob::from_image(&image, 0, 416).unwrap_err(),
      BlobError::InvalidSize {
        width: 0,
        height: 416
      }
    );
  }
}
