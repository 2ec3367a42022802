// 该文件是 Tanjing （探景） 项目的一部分。
// src/bbox.rs - 像素坐标边界框
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

/// 左上角 + 宽高形式的边界框，单位为像素
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BBox {
  /// 左上角 x 坐标
  pub x: i32,
  /// 左上角 y 坐标
  pub y: i32,
  /// 宽度
  pub width: i32,
  /// 高度
  pub height: i32,
}

impl BBox {
  #[inline]
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 由归一化的中心点与宽高换算到像素坐标
  ///
  /// 先在浮点域计算左上角，再统一向零截断为整数像素。
  pub fn from_normalized_center(
    center_x: f32,
    center_y: f32,
    width: f32,
    height: f32,
    image_width: u32,
    image_height: u32,
  ) -> Self {
    let (iw, ih) = (image_width as f32, image_height as f32);
    let abs_w = width * iw;
    let abs_h = height * ih;
    let abs_x = center_x * iw - abs_w / 2.0;
    let abs_y = center_y * ih - abs_h / 2.0;
    Self::new(abs_x as i32, abs_y as i32, abs_w as i32, abs_h as i32)
  }

  #[inline(always)]
  pub fn right(&self) -> i32 {
    self.x.saturating_add(self.width)
  }

  #[inline(always)]
  pub fn bottom(&self) -> i32 {
    self.y.saturating_add(self.height)
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.width <= 0 || self.height <= 0
  }

  pub fn area(&self) -> i64 {
    if self.is_empty() {
      0
    } else {
      self.width as i64 * self.height as i64
    }
  }

  pub fn intersection(&self, other: &BBox) -> Option<BBox> {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());
    // 饱和坐标或负宽度时 i32 相减可能溢出
    let width = x2 as i64 - x1 as i64;
    let height = y2 as i64 - y1 as i64;
    if width <= 0 || height <= 0 {
      return None;
    }
    // 交集不会超过任一输入框的宽高
    Some(BBox::new(
      x1,
      y1,
      width.min(i32::MAX as i64) as i32,
      height.min(i32::MAX as i64) as i32,
    ))
  }

  /// 交并比，并集面积为零时返回 0
  pub fn iou(&self, other: &BBox) -> f32 {
    let inter = self.intersection(other).map_or(0, |r| r.area());
    let union = self.area() + other.area() - inter;
    if union <= 0 {
      0.0
    } else {
      (inter as f64 / union as f64) as f32
    }
  }
}
