//! Analyze 7.5 头部与体素数据.
//!
//! OASIS-1/2 的原始扫描大多是 Analyze 7.5 格式 (通常为大端 int16),
//! `nifti` crate 会因 magic 不符而拒绝它们, 所以这里单独处理.
//!
//! 只解析切片导出需要的字段:
//!
//! | 偏移 | 字段 | 类型 |
//! |---|---|---|
//! | 0 | `sizeof_hdr` | i32, 固定为 348, 同时用于判断字节序 |
//! | 40 | `dim` | i16 × 8 |
//! | 70 | `datatype` | i16 |
//! | 72 | `bitpix` | i16 |
//! | 76 | `pixdim` | f32 × 8 |
//! | 108 | `vox_offset` | f32 |
//! | 344 | `magic` | 4 字节, NIfTI 为 `ni1\0`/`n+1\0` |

use crate::{Error, Result};
use byteordered::{ByteOrdered, Endianness};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// 头部长度.
pub const HEADER_SIZE: usize = 348;

const EXTENTS_OFFSET: usize = 32;
const REGULAR_OFFSET: usize = 38;
const DIM_OFFSET: usize = 40;
const DATATYPE_OFFSET: usize = 70;
const PIXDIM_OFFSET: usize = 76;
const VOX_OFFSET_OFFSET: usize = 108;
const MAGIC_OFFSET: usize = 344;

/// 体素数据类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Datatype {
    /// 2.
    U8,
    /// 4.
    I16,
    /// 8.
    I32,
    /// 16.
    F32,
    /// 64.
    F64,
    /// 256.
    I8,
    /// 512.
    U16,
    /// 768.
    U32,
}

impl Datatype {
    /// 从代码解析.
    pub fn from_code(code: i16) -> Result<Self> {
        Ok(match code {
            2 => Self::U8,
            4 => Self::I16,
            8 => Self::I32,
            16 => Self::F32,
            64 => Self::F64,
            256 => Self::I8,
            512 => Self::U16,
            768 => Self::U32,
            other => return Err(Error::UnsupportedDatatype(other)),
        })
    }

    /// 代码.
    pub const fn code(&self) -> i16 {
        match self {
            Self::U8 => 2,
            Self::I16 => 4,
            Self::I32 => 8,
            Self::F32 => 16,
            Self::F64 => 64,
            Self::I8 => 256,
            Self::U16 => 512,
            Self::U32 => 768,
        }
    }

    /// 每个体素的位数.
    pub const fn bits(&self) -> i16 {
        match self {
            Self::U8 | Self::I8 => 8,
            Self::I16 | Self::U16 => 16,
            Self::I32 | Self::U32 | Self::F32 => 32,
            Self::F64 => 64,
        }
    }
}

/// Analyze 7.5 头部中与体数据相关的字段.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzeHeader {
    /// 文件字节序.
    pub endianness: Endianness,
    /// `dim[0]` 为维数, `dim[1..]` 为各维长度.
    pub dim: [i16; 8],
    /// 体素数据类型.
    pub datatype: Datatype,
    /// 体素尺寸.
    pub pixdim: [f32; 8],
    /// 体素数据在 `.img` 中的起始偏移.
    pub vox_offset: f32,
    /// NIfTI magic; Analyze 文件中通常为全零.
    pub magic: [u8; 4],
}

impl AnalyzeHeader {
    /// 以给定字节序和形状构造头部. 体素尺寸为 1.
    pub fn new(endianness: Endianness, shape: &[usize], datatype: Datatype) -> Result<Self> {
        if shape.is_empty() || shape.len() > 7 {
            return Err(Error::BadShape(shape.to_vec()));
        }
        let mut dim = [1i16; 8];
        dim[0] = shape.len() as i16;
        for (d, &n) in dim[1..].iter_mut().zip(shape) {
            *d = i16::try_from(n).map_err(|_| Error::BadShape(shape.to_vec()))?;
        }
        let mut pixdim = [1.0f32; 8];
        pixdim[0] = 0.0;
        Ok(Self {
            endianness,
            dim,
            datatype,
            pixdim,
            vox_offset: 0.0,
            magic: [0; 4],
        })
    }

    /// 读取头部. 字节序由 `sizeof_hdr` 判断.
    pub fn from_reader<R: Read>(mut input: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        input.read_exact(&mut buf)?;
        let sizeof_hdr = [buf[0], buf[1], buf[2], buf[3]];
        let endianness = if i32::from_le_bytes(sizeof_hdr) == HEADER_SIZE as i32 {
            Endianness::Little
        } else if i32::from_be_bytes(sizeof_hdr) == HEADER_SIZE as i32 {
            Endianness::Big
        } else {
            return Err(Error::InvalidHeader(format!(
                "sizeof_hdr is neither 348 little- nor big-endian: {sizeof_hdr:?}"
            )));
        };

        let mut dim = [0i16; 8];
        let mut rd = ByteOrdered::runtime(&buf[DIM_OFFSET..], endianness);
        for d in dim.iter_mut() {
            *d = rd.read_i16()?;
        }
        let mut rd = ByteOrdered::runtime(&buf[DATATYPE_OFFSET..], endianness);
        let datatype = Datatype::from_code(rd.read_i16()?)?;
        let mut pixdim = [0f32; 8];
        let mut rd = ByteOrdered::runtime(&buf[PIXDIM_OFFSET..], endianness);
        for p in pixdim.iter_mut() {
            *p = rd.read_f32()?;
        }
        let vox_offset = ByteOrdered::runtime(&buf[VOX_OFFSET_OFFSET..], endianness).read_f32()?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[MAGIC_OFFSET..HEADER_SIZE]);

        let header = Self {
            endianness,
            dim,
            datatype,
            pixdim,
            vox_offset,
            magic,
        };
        header.shape()?;
        Ok(header)
    }

    /// 从文件读取头部.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// 写出 348 字节的头部.
    pub fn to_writer<W: Write>(&self, mut output: W) -> Result<()> {
        let e = self.endianness;
        let mut buf = [0u8; HEADER_SIZE];
        ByteOrdered::runtime(&mut buf[..], e).write_i32(HEADER_SIZE as i32)?;
        ByteOrdered::runtime(&mut buf[EXTENTS_OFFSET..], e).write_i32(16384)?;
        buf[REGULAR_OFFSET] = b'r';
        let mut w = ByteOrdered::runtime(&mut buf[DIM_OFFSET..], e);
        for d in self.dim {
            w.write_i16(d)?;
        }
        let mut w = ByteOrdered::runtime(&mut buf[DATATYPE_OFFSET..], e);
        w.write_i16(self.datatype.code())?;
        w.write_i16(self.datatype.bits())?;
        let mut w = ByteOrdered::runtime(&mut buf[PIXDIM_OFFSET..], e);
        for p in self.pixdim {
            w.write_f32(p)?;
        }
        ByteOrdered::runtime(&mut buf[VOX_OFFSET_OFFSET..], e).write_f32(self.vox_offset)?;
        buf[MAGIC_OFFSET..].copy_from_slice(&self.magic);
        output.write_all(&buf)?;
        Ok(())
    }

    /// 体数据形状 (Fortran 序, 即 x 变化最快).
    pub fn shape(&self) -> Result<Vec<usize>> {
        let ndim = self.dim[0];
        if !(1..=7).contains(&ndim) {
            return Err(Error::InvalidHeader(format!("dim[0] = {ndim}")));
        }
        let dims = &self.dim[1..=ndim as usize];
        if dims.iter().any(|&d| d <= 0) {
            return Err(Error::BadShape(
                dims.iter().map(|&d| d.max(0) as usize).collect(),
            ));
        }
        Ok(dims.iter().map(|&d| d as usize).collect())
    }

    /// 体素个数. 乘积溢出 `usize` 时返回 [`Error::InvalidHeader`].
    pub fn voxel_count(&self) -> Result<usize> {
        self.shape()?
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                Error::InvalidHeader(format!("voxel count of dim {:?} overflows", self.dim))
            })
    }

    /// 读取 `.img` 中的体素, 转换为 `f32`.
    pub fn read_volume<P: AsRef<Path>>(&self, img: P) -> Result<ArrayD<f32>> {
        let bytes = fs::read(img)?;
        self.decode(&bytes)
    }

    /// 从内存中的 `.img` 内容解码.
    pub fn decode(&self, bytes: &[u8]) -> Result<ArrayD<f32>> {
        let shape = self.shape()?;
        let n = self.voxel_count()?;
        let offset = if self.vox_offset.is_finite() && self.vox_offset > 0.0 {
            self.vox_offset as usize
        } else {
            0
        };
        let needed = n
            .checked_mul(self.datatype.bits() as usize / 8)
            .and_then(|b| b.checked_add(offset))
            .ok_or_else(|| Error::InvalidHeader(format!("byte count of {n} voxels overflows")))?;
        if bytes.len() < needed {
            return Err(Error::InvalidHeader(format!(
                "image data has {} bytes, header requires {needed}",
                bytes.len()
            )));
        }
        let mut rd = ByteOrdered::runtime(&bytes[offset..], self.endianness);

        macro_rules! read_voxels {
            ($read: ident) => {{
                let mut out = Vec::with_capacity(n);
                for _ in 0..n {
                    out.push(rd.$read()? as f32);
                }
                out
            }};
        }

        let voxels: Vec<f32> = match self.datatype {
            Datatype::U8 => read_voxels!(read_u8),
            Datatype::I8 => read_voxels!(read_i8),
            Datatype::I16 => read_voxels!(read_i16),
            Datatype::U16 => read_voxels!(read_u16),
            Datatype::I32 => read_voxels!(read_i32),
            Datatype::U32 => read_voxels!(read_u32),
            Datatype::F32 => read_voxels!(read_f32),
            Datatype::F64 => read_voxels!(read_f64),
        };
        ArrayD::from_shape_vec(IxDyn(&shape).f(), voxels).map_err(|_| Error::BadShape(shape))
    }

    /// 是否带有 NIfTI magic.
    #[inline]
    pub fn is_nifti(&self) -> bool {
        &self.magic == b"ni1\0" || &self.magic == b"n+1\0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_header_round_trip() {
        for e in [Endianness::Big, Endianness::Little] {
            let h = AnalyzeHeader::new(e, &[256, 256, 128, 1], Datatype::I16).unwrap();
            let mut buf = Vec::new();
            h.to_writer(&mut buf).unwrap();
            assert_eq!(buf.len(), HEADER_SIZE);
            let back = AnalyzeHeader::from_reader(buf.as_slice()).unwrap();
            assert_eq!(back, h);
            assert_eq!(back.shape().unwrap(), [256, 256, 128, 1]);
            assert!(!back.is_nifti());
        }
    }

    #[test]
    fn test_bad_header() {
        let buf = [0u8; HEADER_SIZE];
        assert!(matches!(
            AnalyzeHeader::from_reader(&buf[..]),
            Err(Error::InvalidHeader(_))
        ));
        assert!(AnalyzeHeader::from_reader(&buf[..10]).is_err());
        assert!(matches!(
            Datatype::from_code(128),
            Err(Error::UnsupportedDatatype(128))
        ));
    }

    #[test]
    fn test_decode_fortran_order() {
        let h = AnalyzeHeader::new(Endianness::Big, &[2, 3, 2], Datatype::I16).unwrap();
        let mut bytes = Vec::new();
        for v in 0i16..12 {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        let arr = h.decode(&bytes).unwrap();
        assert_eq!(arr.shape(), [2, 3, 2]);
        // x 变化最快.
        let expected = Array3::from_shape_fn((2, 3, 2), |(x, y, z)| (x + 2 * y + 6 * z) as f32);
        assert_eq!(arr, expected.into_dyn());

        assert!(h.decode(&bytes[..20]).is_err());
    }

    #[test]
    fn test_voxel_count_overflow() {
        let h = AnalyzeHeader::new(Endianness::Little, &[4, 5, 6], Datatype::F32).unwrap();
        assert_eq!(h.voxel_count().unwrap(), 120);

        // 损坏的头部: 7 个轴都取 i16 最大值.
        let h = AnalyzeHeader::new(Endianness::Big, &[i16::MAX as usize; 7], Datatype::F64).unwrap();
        assert!(matches!(h.voxel_count(), Err(Error::InvalidHeader(_))));
        assert!(matches!(h.decode(&[0u8; 64]), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_read_volume() {
        let dir = tempfile::tempdir().unwrap();
        let h = AnalyzeHeader::new(Endianness::Little, &[4, 4, 4], Datatype::U8).unwrap();
        let path = dir.path().join("v.img");
        fs::write(&path, [7u8; 64]).unwrap();
        let arr = h.read_volume(&path).unwrap();
        assert!(arr.iter().all(|&v| v == 7.0));

        fs::write(&path, [7u8; 63]).unwrap();
        assert!(matches!(h.read_volume(&path), Err(Error::InvalidHeader(_))));
    }
}
