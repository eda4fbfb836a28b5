//! 每个方向导出哪些切片.

use crate::consts::FIXED_SLICE_WINDOW;
use crate::orient::Orientation;
use crate::taxonomy::{ScanFields, Tracer};
use std::ops::Range;

/// 切片索引范围策略.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlicePolicy {
    /// 结构像: 矢状面取中间一半, 冠状面和轴状面取固定窗口.
    Structural,

    /// PET: 轴状面按示踪剂取相对范围, 其余同结构像.
    Tracer(Tracer),
}

impl SlicePolicy {
    /// 按扫描类型选择策略.
    pub fn for_fields(fields: &ScanFields) -> Self {
        match fields.tracer {
            Some(tracer) => Self::Tracer(tracer),
            None => Self::Structural,
        }
    }

    /// 沿某方向长度为 `len` 的轴上请求导出的索引范围.
    ///
    /// # 注意
    ///
    /// 返回的范围可能超出 `0..len` (例如固定窗口 `[100, 161)` 遇到较小的体数据),
    /// 调用者需要跳过越界的索引.
    pub fn range(&self, orientation: Orientation, len: usize) -> Range<usize> {
        match (self, orientation) {
            (_, Orientation::Sagittal) => {
                let margin = len / 4;
                margin..len - margin
            }
            (Self::Tracer(tracer), Orientation::Axial) => {
                let (lo, hi) = tracer_fraction(*tracer);
                let start = (len as f64 * lo).floor() as usize;
                // 含右端点.
                let end = (len as f64 * hi).floor() as usize + 1;
                start..end
            }
            _ => FIXED_SLICE_WINDOW,
        }
    }
}

/// 示踪剂摄取区域在轴状面上的相对范围.
const fn tracer_fraction(tracer: Tracer) -> (f64, f64) {
    match tracer {
        Tracer::Av45 | Tracer::Pib => (0.2, 0.9),
        Tracer::Fdg => (0.3, 0.8),
    }
}
