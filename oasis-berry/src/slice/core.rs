use crate::Idx2d;
use ndarray::iter::IndexedIter;
use ndarray::{ArrayView2, Ix2};

/// 不可变、借用的二维 MRI/PET 切片, 元素为体素强度.
pub struct VolumeSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::volume::MriVolume`].
    data: ArrayView2<'a, f32>,
}

impl<'a> VolumeSlice<'a> {
    /// 包装一个二维视图.
    #[inline]
    pub fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 形状 `(第一轴, 第二轴)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 带坐标的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> IndexedIter<'_, f32, Ix2> {
        self.data.indexed_iter()
    }

    /// 有限像素值中的最小值和最大值. 没有有限像素时返回 `None`.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_min_max() {
        let a = array![[1.0f32, f32::NAN], [-3.0, 7.5]];
        let s = VolumeSlice::new(a.view());
        assert_eq!(s.shape(), (2, 2));
        assert_eq!(s.min_max(), Some((-3.0, 7.5)));
        assert_eq!(s.indexed_iter().nth(3), Some(((1, 1), &7.5)));

        let a = array![[f32::NAN, f32::INFINITY]];
        assert_eq!(VolumeSlice::new(a.view()).min_max(), None);
    }
}
