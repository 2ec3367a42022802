// 该文件是 Tanjing （探景） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 解码单个图像文件为 RGB 图像
pub fn load(path: &Path) -> Result<RgbImage, ImageFileInputError> {
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
  debug!(
    "读取图像 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(image.into_rgb8())
}

/// 按顺序逐个读取图像，单个文件读取失败不影响后续文件
pub struct ImageFileInput {
  paths: VecDeque<PathBuf>,
}

impl ImageFileInput {
  pub fn new<I, P>(paths: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    Self {
      paths: paths.into_iter().map(Into::into).collect(),
    }
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

impl Iterator for ImageFileInput {
  type Item = (PathBuf, Result<RgbImage, ImageFileInputError>);

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.paths.pop_front()?;
    let image = load(&path);
    Some((path, image))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.paths.len(), Some(self.paths.len()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn yields_every_path_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.png");
    RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])).save(&good).unwrap();
    let missing = dir.path().join("missing.jpg");
    let garbage = dir.path().join("garbage.png");
    std::fs::write(&garbage, b"not an image").unwrap();

    let mut input = ImageFileInput::new([&good, &missing, &garbage]);
    assert_eq!(input.remaining(), 3);

    let (path, image) = input.next().unwrap();
    assert_eq!(path, good);
    assert_eq!(image.unwrap().dimensions(), (3, 2));

    let (path, image) = input.next().unwrap();
    assert_eq!(path, missing);
    assert!(matches!(image, Err(ImageFileInputError::IoError(_))));

    let (_, image) = input.next().unwrap();
    assert!(image.is_err());

    assert!(input.next().is_none());
  }
}
