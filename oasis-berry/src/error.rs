//! 运行时错误.

use std::path::PathBuf;
use thiserror::Error;

/// 本 crate 所有可恢复错误.
#[derive(Error, Debug)]
pub enum Error {
    /// 底层 I/O 错误.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV 读写错误.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Excel 表格读取错误.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// nifti 文件解析错误.
    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 图像编码或写入错误.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// 目录遍历错误.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// 归档根目录不存在. 这是唯一的致命配置错误.
    #[error("archive root `{}` does not exist", .0.display())]
    ArchiveNotFound(PathBuf),

    /// 输入目录不存在.
    #[error("directory `{}` does not exist", .0.display())]
    MissingDir(PathBuf),

    /// 表格为空或没有表头.
    #[error("table `{}` is empty", .0.display())]
    EmptyTable(PathBuf),

    /// 表格缺少必需的列.
    #[error("table `{}` has no column `{column}`", path.display())]
    MissingColumn {
        /// 表格路径.
        path: PathBuf,
        /// 缺失的列名.
        column: String,
    },

    /// Analyze/NIfTI 头部不合法.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// 不支持的体素数据类型代码.
    #[error("unsupported datatype code {0}")]
    UnsupportedDatatype(i16),

    /// 体数据形状不符合 3D/4D 要求.
    #[error("unexpected volume shape {0:?}")]
    BadShape(Vec<usize>),

    /// 体数据文件组不完整或不一致.
    #[error("invalid volume group `{base}`: {reason}")]
    InvalidGroup {
        /// 规范基础文件名.
        base: String,
        /// 具体原因.
        reason: GroupError,
    },
}

/// 体数据文件组的组成错误.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum GroupError {
    /// 没有任何文件.
    #[error("no files")]
    Empty,

    /// 只有 `.hdr`, 缺少 `.img`.
    #[error("header without image data")]
    MissingImage,

    /// 只有 `.img`, 缺少 `.hdr`.
    #[error("image data without header")]
    MissingHeader,

    /// `.nii.gz` 与 `.img`/`.hdr` 混在同一组.
    #[error("mixed single-file and paired formats")]
    MixedFormats,
}

/// 本 crate 的 `Result` 别名.
pub type Result<T> = std::result::Result<T, Error>;
