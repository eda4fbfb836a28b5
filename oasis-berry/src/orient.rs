//! 解剖方向推断与 4D 时间帧选择.

use crate::volume::{Affine, MriVolume};
use log::debug;
use ndarray::{ArrayView3, Axis};
use ordered_float::OrderedFloat;
use std::fmt;

/// 解剖方向.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Orientation {
    /// 矢状面, 对应世界坐标 x (左右).
    Sagittal,

    /// 冠状面, 对应世界坐标 y (前后).
    Coronal,

    /// 轴状面, 对应世界坐标 z (上下).
    Axial,
}

impl Orientation {
    /// 所有方向, 按世界坐标轴顺序.
    pub const ALL: [Orientation; 3] = [Self::Sagittal, Self::Coronal, Self::Axial];

    /// 输出目录名.
    #[inline]
    pub const fn dir_name(&self) -> &'static str {
        match self {
            Self::Sagittal => "Sagittal",
            Self::Coronal => "Coronal",
            Self::Axial => "Axial",
        }
    }

    /// 输出文件名中的小写名字.
    #[inline]
    pub const fn file_tag(&self) -> &'static str {
        match self {
            Self::Sagittal => "sagittal",
            Self::Coronal => "coronal",
            Self::Axial => "axial",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// 每个解剖方向对应的数组轴.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AxisMap {
    /// 矢状面切片沿此轴取.
    pub sagittal: usize,

    /// 冠状面切片沿此轴取.
    pub coronal: usize,

    /// 轴状面切片沿此轴取.
    pub axial: usize,
}

impl AxisMap {
    /// 某方向对应的数组轴.
    #[inline]
    pub fn axis(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Sagittal => self.sagittal,
            Orientation::Coronal => self.coronal,
            Orientation::Axial => self.axial,
        }
    }
}

/// 推断依据.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OrientationSource {
    /// 仿射矩阵的主轴.
    Affine,

    /// 轴长排序.
    Shape,
}

/// 按轴长推断方向: 最短轴为矢状面, 中间为冠状面, 最长为轴状面.
///
/// # 注意
///
/// 这是一个近似, 只对常见的脑部扫描视野成立. 长度相同时按轴序稳定排序.
/// 只看前三个 (空间) 轴; 少于三个轴时返回 `None`.
pub fn infer_from_shape(shape: &[usize]) -> Option<AxisMap> {
    let spatial = shape.get(..3)?;
    let mut order = [0usize, 1, 2];
    order.sort_by_key(|&i| spatial[i]);
    Some(AxisMap {
        sagittal: order[0],
        coronal: order[1],
        axial: order[2],
    })
}

/// 按仿射矩阵推断方向: 世界坐标的每一行 (x, y, z) 取绝对值最大的数组轴.
///
/// 结果不是一个排列 (例如斜切扫描两个世界轴落在同一数组轴上) 时返回 `None`.
pub fn infer_from_affine(affine: &Affine) -> Option<AxisMap> {
    let mut axes = [0usize; 3];
    for (row, axis) in affine.iter().take(3).zip(axes.iter_mut()) {
        if row[..3].iter().any(|v| !v.is_finite()) {
            return None;
        }
        *axis = (0..3).max_by_key(|&j| OrderedFloat(row[j].abs()))?;
        if row[*axis] == 0.0 {
            return None;
        }
    }
    let mut seen = axes;
    seen.sort_unstable();
    if seen != [0, 1, 2] {
        return None;
    }
    Some(AxisMap {
        sagittal: axes[0],
        coronal: axes[1],
        axial: axes[2],
    })
}

/// 推断方向. 有仿射矩阵时优先使用, 否则 (或仿射矩阵无效时) 按轴长推断.
pub fn infer(shape: &[usize], affine: Option<&Affine>) -> Option<(AxisMap, OrientationSource)> {
    if let Some(affine) = affine {
        match infer_from_affine(affine) {
            Some(map) => return Some((map, OrientationSource::Affine)),
            None => debug!("Affine is not axis-aligned, falling back to shape heuristic"),
        }
    }
    infer_from_shape(shape).map(|map| (map, OrientationSource::Shape))
}

/// 体素值的总体方差.
pub fn variance(frame: ArrayView3<'_, f32>) -> f64 {
    let n = frame.len();
    if n == 0 {
        return 0.0;
    }
    let mean = frame.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    frame
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        fn frame_variances(volume: &MriVolume) -> Vec<f64> {
            (0..volume.frames())
                .into_par_iter()
                .map(|t| variance(volume.frame(t)))
                .collect()
        }
    } else {
        fn frame_variances(volume: &MriVolume) -> Vec<f64> {
            (0..volume.frames()).map(|t| variance(volume.frame(t))).collect()
        }
    }
}

/// 选出方差最大的 `top_n` 个时间帧, 按时间顺序返回.
///
/// 方差相同时时间靠前的帧优先. 含 NaN 体素的帧方差为 NaN, 排在最后.
/// `top_n` 大于帧数时返回全部帧.
pub fn select_frames(volume: &MriVolume, top_n: usize) -> Vec<usize> {
    if volume.frames() <= top_n {
        return (0..volume.frames()).collect();
    }
    let variances = frame_variances(volume);
    let mut ranked: Vec<usize> = (0..variances.len()).collect();
    ranked.sort_by_key(|&t| {
        let v = variances[t];
        std::cmp::Reverse(OrderedFloat(if v.is_nan() { f64::NEG_INFINITY } else { v }))
    });
    ranked.truncate(top_n);
    ranked.sort_unstable();
    ranked
}

/// 沿 `axis` 取一个三维帧的第 `index` 张切片. 越界时返回 `None`.
pub fn slice_along(
    frame: ArrayView3<'_, f32>,
    axis: usize,
    index: usize,
) -> Option<ndarray::ArrayView2<'_, f32>> {
    if axis >= 3 || index >= frame.len_of(Axis(axis)) {
        return None;
    }
    Some(frame.index_axis_move(Axis(axis), index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_infer_from_shape() {
        let m = infer_from_shape(&[256, 128, 64]).unwrap();
        assert_eq!(
            m,
            AxisMap {
                sagittal: 2,
                coronal: 1,
                axial: 0
            }
        );
        // 4D 的时间轴不参与.
        let m = infer_from_shape(&[176, 208, 176, 1]).unwrap();
        assert_eq!(m.axis(Orientation::Sagittal), 0);
        assert_eq!(m.axis(Orientation::Coronal), 2);
        assert_eq!(m.axis(Orientation::Axial), 1);
        // 全部相等时保持轴序.
        let m = infer_from_shape(&[64, 64, 64]).unwrap();
        assert_eq!((m.sagittal, m.coronal, m.axial), (0, 1, 2));
        assert!(infer_from_shape(&[64, 64]).is_none());
    }

    #[test]
    fn test_infer_from_affine() {
        // RAS 对角.
        let ras = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let m = infer_from_affine(&ras).unwrap();
        assert_eq!((m.sagittal, m.coronal, m.axial), (0, 1, 2));

        // 数组轴 0 为上下, 轴 1 为前后 (取负), 轴 2 为左右.
        let permuted = [
            [0.0, 0.1, -1.2, 0.0],
            [0.0, -1.0, 0.0, 0.0],
            [1.0, 0.0, 0.05, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let m = infer_from_affine(&permuted).unwrap();
        assert_eq!((m.sagittal, m.coronal, m.axial), (2, 1, 0));

        // 不是排列.
        let oblique = [
            [1.0, 0.0, 0.0, 0.0],
            [0.9, 0.1, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert!(infer_from_affine(&oblique).is_none());
        assert!(infer_from_affine(&[[0.0; 4]; 4]).is_none());

        // 回退到轴长.
        let (m, src) = infer(&[256, 128, 64], Some(&oblique)).unwrap();
        assert_eq!(src, OrientationSource::Shape);
        assert_eq!(m.sagittal, 2);
        let (m, src) = infer(&[256, 128, 64], Some(&permuted)).unwrap();
        assert_eq!(src, OrientationSource::Affine);
        assert_eq!(m.sagittal, 2);
        assert_eq!(m.axial, 0);
    }

    #[test]
    fn test_select_frames() {
        // 第 1, 3 帧方差最大.
        let data = Array4::from_shape_fn((3, 3, 3, 4), |(x, y, z, t)| match t {
            1 => (x * 9 + y * 3 + z) as f32 * 10.0,
            3 => (x * 9 + y * 3 + z) as f32,
            _ => 1.0,
        });
        let v = MriVolume::from_parts(data.into_dyn(), None).unwrap();
        assert_eq!(select_frames(&v, 1), [1]);
        assert_eq!(select_frames(&v, 2), [1, 3]);
        assert_eq!(select_frames(&v, 3), [0, 1, 3]);
        assert_eq!(select_frames(&v, 10), [0, 1, 2, 3]);
        assert!(variance(v.frame(0)).abs() < 1e-12);
    }

    #[test]
    fn test_select_frames_nan_last() {
        // 第 0 帧方差最大但含 NaN, 第 2 帧为常数.
        let data = Array4::from_shape_fn((2, 2, 2, 3), |(x, y, z, t)| match (t, x, y, z) {
            (0, 0, 0, 0) => f32::NAN,
            (0, ..) => (x * 4 + y * 2 + z) as f32 * 100.0,
            (1, ..) => (x + y + z) as f32,
            _ => 5.0,
        });
        let v = MriVolume::from_parts(data.into_dyn(), None).unwrap();
        assert!(variance(v.frame(0)).is_nan());
        assert_eq!(select_frames(&v, 1), [1]);
        assert_eq!(select_frames(&v, 2), [1, 2]);
    }

    #[test]
    fn test_slice_along() {
        let data = Array4::from_shape_fn((2, 3, 4, 1), |(x, y, z, _)| (x * 100 + y * 10 + z) as f32);
        let v = MriVolume::from_parts(data.into_dyn(), None).unwrap();
        let s = slice_along(v.frame(0), 1, 2).unwrap();
        assert_eq!(s.shape(), [2, 4]);
        assert_eq!(s[(1, 3)], 123.0);
        assert!(slice_along(v.frame(0), 1, 3).is_none());
        assert!(slice_along(v.frame(0), 3, 0).is_none());
    }
}
