//! 体数据解码.
//!
//! 支持三种输入:
//!
//! 1. 单文件 `.nii.gz`;
//! 2. NIfTI 成对格式 (`.hdr` magic 为 `ni1`);
//! 3. Analyze 7.5 成对格式.
//!
//! 解码结果统一为 `(x, y, z, t)` 顺序的四维 `f32` 数组, 三维数据的 `t` 轴长度为 1.

mod analyze;

pub use analyze::{AnalyzeHeader, Datatype, HEADER_SIZE};

use crate::catalog::{VolumeFiles, VolumeGroup};
use crate::{Error, Idx3d, Result};
use log::debug;
use ndarray::{Array4, ArrayD, ArrayView3, Axis, Ix4};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;

/// 体素坐标到世界坐标的 4×4 仿射矩阵.
pub type Affine = [[f64; 4]; 4];

/// 解码后的 MRI/PET 体数据.
#[derive(Clone, Debug)]
pub struct MriVolume {
    data: Array4<f32>,
    affine: Option<Affine>,
}

impl MriVolume {
    /// 由数组和仿射矩阵构造.
    ///
    /// 维数多于 4 时会去掉尾部长度为 1 的轴 (Analyze 文件常见 `dim[0] = 4, dim[4] = 1`);
    /// 最终必须为 3 维或 4 维, 且每个轴非空.
    pub fn from_parts(data: ArrayD<f32>, affine: Option<Affine>) -> Result<Self> {
        let mut data = data;
        while data.ndim() > 4 && data.shape()[data.ndim() - 1] == 1 {
            let last = data.ndim() - 1;
            data = data.index_axis_move(Axis(last), 0);
        }
        if data.ndim() == 3 {
            data.insert_axis_inplace(Axis(3));
        }
        let shape = data.shape().to_vec();
        if shape.iter().any(|&n| n == 0) {
            return Err(Error::BadShape(shape));
        }
        let data = data
            .into_dimensionality::<Ix4>()
            .map_err(|_| Error::BadShape(shape))?;
        Ok(Self { data, affine })
    }

    /// 解码一个体数据组.
    pub fn open(group: &VolumeGroup) -> Result<Self> {
        match group.volume_files() {
            VolumeFiles::Single(path) => Self::open_nifti(path),
            VolumeFiles::Pair { hdr, img } => Self::open_pair(hdr, img),
        }
    }

    /// 解码单文件 NIfTI.
    pub fn open_nifti<P: AsRef<Path>>(path: P) -> Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let affine = affine_from_nifti(obj.header());
        let data = obj.into_volume().into_ndarray::<f32>()?;
        Self::from_parts(data, affine)
    }

    /// 解码成对格式. 先按 NIfTI 成对格式读取, 头部不是 NIfTI 时按 Analyze 7.5 读取.
    pub fn open_pair<P: AsRef<Path>, Q: AsRef<Path>>(hdr: P, img: Q) -> Result<Self> {
        let (hdr, img) = (hdr.as_ref(), img.as_ref());
        let header = AnalyzeHeader::from_file(hdr)?;
        if header.is_nifti() && hdr.parent() == img.parent() {
            return Self::open_nifti(hdr);
        }
        debug!("Reading `{}` as Analyze 7.5", hdr.display());
        Self::from_parts(header.read_volume(img)?, None)
    }

    /// 底层数组, `(x, y, z, t)`.
    #[inline]
    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// 仿射矩阵. Analyze 文件以及 sform/qform 均未设置的 NIfTI 文件没有仿射矩阵.
    #[inline]
    pub fn affine(&self) -> Option<&Affine> {
        self.affine.as_ref()
    }

    /// 三个空间轴的长度.
    #[inline]
    pub fn spatial_shape(&self) -> Idx3d {
        let s = self.data.shape();
        (s[0], s[1], s[2])
    }

    /// 时间帧个数.
    #[inline]
    pub fn frames(&self) -> usize {
        self.data.shape()[3]
    }

    /// 是否为 4D 时间序列.
    #[inline]
    pub fn is_time_resolved(&self) -> bool {
        self.frames() > 1
    }

    /// 第 `t` 帧.
    ///
    /// # 注意
    ///
    /// `t` 越界时 panic.
    #[inline]
    pub fn frame(&self, t: usize) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(3), t)
    }
}

/// 由 NIfTI 头部求仿射矩阵: sform 优先, 其次 qform 四元数, 都没有则为 `None`.
pub fn affine_from_nifti(h: &NiftiHeader) -> Option<Affine> {
    if h.sform_code > 0 {
        let row = |r: &[f32; 4]| [r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64];
        return Some([
            row(&h.srow_x),
            row(&h.srow_y),
            row(&h.srow_z),
            [0.0, 0.0, 0.0, 1.0],
        ]);
    }
    if h.qform_code > 0 {
        let (b, c, d) = (h.quatern_b as f64, h.quatern_c as f64, h.quatern_d as f64);
        let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();
        let qfac = if h.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let (dx, dy, dz) = (
            h.pixdim[1] as f64,
            h.pixdim[2] as f64,
            h.pixdim[3] as f64 * qfac,
        );
        let r = [
            [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
            [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
            [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - b * b - c * c],
        ];
        let offset = [h.quatern_x as f64, h.quatern_y as f64, h.quatern_z as f64];
        let mut m = [[0.0; 4]; 4];
        for i in 0..3 {
            m[i] = [r[i][0] * dx, r[i][1] * dy, r[i][2] * dz, offset[i]];
        }
        m[3] = [0.0, 0.0, 0.0, 1.0];
        return Some(m);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteordered::Endianness;
    use ndarray::{Array, IxDyn};
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_from_parts() {
        let v = MriVolume::from_parts(ArrayD::zeros(IxDyn(&[4, 5, 6])), None).unwrap();
        assert_eq!(v.spatial_shape(), (4, 5, 6));
        assert_eq!(v.frames(), 1);
        assert!(!v.is_time_resolved());
        assert_eq!(v.frame(0).shape(), [4, 5, 6]);

        let v = MriVolume::from_parts(ArrayD::zeros(IxDyn(&[4, 5, 6, 3])), None).unwrap();
        assert_eq!(v.frames(), 3);

        // 尾部单例轴.
        let v = MriVolume::from_parts(ArrayD::zeros(IxDyn(&[4, 5, 6, 2, 1, 1])), None).unwrap();
        assert_eq!(v.frames(), 2);

        let bads: [&[usize]; 3] = [&[4, 5], &[4, 5, 6, 2, 2], &[4, 0, 6]];
        for bad in bads {
            assert!(matches!(
                MriVolume::from_parts(ArrayD::zeros(IxDyn(bad)), None),
                Err(Error::BadShape(_))
            ));
        }
    }

    #[test]
    fn test_qform_identity() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 1;
        h.quatern_b = 0.0;
        h.quatern_c = 0.0;
        h.quatern_d = 0.0;
        h.pixdim = [1.0, 2.0, 3.0, 4.0, 1.0, 1.0, 1.0, 1.0];
        let m = affine_from_nifti(&h).unwrap();
        assert_eq!(m[0][..3], [2.0, 0.0, 0.0]);
        assert_eq!(m[1][..3], [0.0, 3.0, 0.0]);
        assert_eq!(m[2][..3], [0.0, 0.0, 4.0]);

        h.qform_code = 0;
        assert!(affine_from_nifti(&h).is_none());

        h.sform_code = 1;
        h.srow_x = [0.0, 0.0, 1.0, 0.0];
        h.srow_y = [1.0, 0.0, 0.0, 0.0];
        h.srow_z = [0.0, 1.0, 0.0, 0.0];
        let m = affine_from_nifti(&h).unwrap();
        assert_eq!(m[0], [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_open_analyze_pair() {
        let dir = tempfile::tempdir().unwrap();
        let hdr = dir.path().join("OAS1_0001_MR1_mpr-1_anon.hdr");
        let img = dir.path().join("OAS1_0001_MR1_mpr-1_anon.img");
        let header =
            AnalyzeHeader::new(Endianness::Big, &[3, 4, 5, 1], Datatype::I16).unwrap();
        header.to_writer(File::create(&hdr).unwrap()).unwrap();
        let expected = Array::from_shape_fn((3, 4, 5), |(x, y, z)| (x * 100 + y * 10 + z) as f32);
        let mut f = File::create(&img).unwrap();
        // Fortran 序写出.
        for z in 0..5 {
            for y in 0..4 {
                for x in 0..3 {
                    f.write_all(&(expected[(x, y, z)] as i16).to_be_bytes()).unwrap();
                }
            }
        }
        drop(f);

        let v = MriVolume::open_pair(&hdr, &img).unwrap();
        assert!(v.affine().is_none());
        assert_eq!(v.spatial_shape(), (3, 4, 5));
        assert_eq!(v.frame(0), expected.view());
    }
}
