// 该文件是 Tanjing （探景） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  labels::ClassNames,
  model::DetectResult,
  output::{
    Render,
    annotate::{AnnotateError, AnnotateReport, Annotator},
    record::{Record, RecordKind},
  },
};

const FALLBACK_FILE_NAME: &str = "frame.png";

pub struct SaveImageFileOutput {
  directory: PathBuf,
  annotator: Annotator,
  record: Option<Record>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("绘制器错误: {0}")]
  AnnotateError(#[from] AnnotateError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("未知的记录格式: {0}")]
  UnknownRecord(String),
  #[error("无效的字体大小: {0}")]
  InvalidFontSize(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "dir";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut output = SaveImageFileOutput::new(uri.path())?;
    for (key, value) in uri.query_pairs() {
      if key == "record" {
        let kind = RecordKind::parse(&value)
          .ok_or_else(|| SaveImageFileError::UnknownRecord(value.to_string()))?;
        output = output.with_record(kind);
      } else if key == "font_size" {
        let size = value
          .parse::<f32>()
          .ok()
          .filter(|size| size.is_finite() && *size > 0.0)
          .ok_or_else(|| SaveImageFileError::InvalidFontSize(value.to_string()))?;
        output.annotator = output.annotator.with_font_size(size);
      }
    }
    Ok(output)
  }
}

impl SaveImageFileOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Result<Self, SaveImageFileError> {
    Ok(SaveImageFileOutput {
      directory: directory.into(),
      annotator: Annotator::new()?,
      record: None,
    })
  }

  pub fn with_record(mut self, kind: RecordKind) -> Self {
    self.record = Some(Record { kind });
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// 输出文件沿用输入文件名
  pub fn target_path(&self, source: &Path) -> PathBuf {
    let name = source
      .file_name()
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(FALLBACK_FILE_NAME));
    self.directory.join(name)
  }

  fn save_image(&self, image: &RgbImage, path: &Path) -> Result<(), SaveImageFileError> {
    if !self.directory.as_os_str().is_empty() {
      std::fs::create_dir_all(&self.directory)?;
    }

    image.save(path)?;
    info!("保存图像到文件: {}", path.display());

    Ok(())
  }
}

impl Render for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    source: &Path,
    mut image: RgbImage,
    result: &DetectResult,
    names: &ClassNames,
  ) -> Result<AnnotateReport, Self::Error> {
    let report = self.annotator.annotate_all(&mut image, result, names);
    if report.label_errors > 0 {
      warn!(
        "{}: {} 个标签绘制失败",
        source.display(),
        report.label_errors
      );
    }

    let path = self.target_path(source);
    self.save_image(&image, &path)?;

    if let Some(record) = &self.record {
      let record_path = record.record(result, names, &path)?;
      info!("保存检测记录: {}", record_path.display());
    }

    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_directory_and_record_kind() {
    let url = Url::parse("dir:///tmp/out?record=json").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.directory(), Path::new("/tmp/out"));
    assert_eq!(output.record.as_ref().map(|r| r.kind), Some(RecordKind::Json));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("image:///tmp/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn rejects_unknown_record() {
    let url = Url::parse("dir:///tmp/out?record=xml").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::UnknownRecord(kind)) if kind == "xml"
    ));
  }

  #[test]
  fn parses_font_size() {
    let url = Url::parse("dir:///tmp/out?font_size=24&record=id").unwrap();
    assert!(SaveImageFileOutput::from_url(&url).is_ok());

    for bad in ["0", "-3", "big"] {
      let url = Url::parse(&format!("dir:///tmp/out?font_size={}", bad)).unwrap();
      assert!(matches!(
        SaveImageFileOutput::from_url(&url),
        Err(SaveImageFileError::InvalidFontSize(value)) if value == bad
      ));
    }
  }

  #[test]
  fn target_keeps_file_name() {
    let output = SaveImageFileOutput::new("/tmp/out").unwrap();
    assert_eq!(
      output.target_path(Path::new("net/dog.jpg")),
      PathBuf::from("/tmp/out/dog.jpg")
    );
  }

  #[test]
  fn saves_annotated_image_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = SaveImageFileOutput::new(dir.path().join("out"))
      .unwrap()
      .with_record(RecordKind::Name);
    let image = RgbImage::new(32, 32);
    let report = output
      .render_result(
        Path::new("in/sample.png"),
        image,
        &DetectResult::default(),
        &ClassNames::coco(),
      )
      .unwrap();
    assert_eq!(report, AnnotateReport::default());
    assert!(dir.path().join("out/sample.png").exists());
    assert!(dir.path().join("out/sample.txt").exists());
  }
}
