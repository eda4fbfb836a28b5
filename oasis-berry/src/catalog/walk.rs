//! 归档遍历与体数据分组.

use crate::taxonomy::{classify_path, Classified, FileFormat, ScanFields};
use crate::{Error, GroupError, Result};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 一个体数据组的文件.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VolumeFiles<'a> {
    /// 单文件 `.nii.gz`.
    Single(&'a Path),

    /// 成对格式.
    Pair {
        /// `.hdr` 头部.
        hdr: &'a Path,
        /// `.img` 体素数据.
        img: &'a Path,
    },
}

/// 构成一个可解码体数据的一到两个文件: 单个 `.nii.gz`, 或 `.img` + `.hdr`.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeGroup {
    base: String,
    files: Vec<Classified>,
}

impl VolumeGroup {
    /// 检查并组装. `files` 必须共享同一个规范基础文件名.
    ///
    /// 同一格式出现多次时保留路径排序后的第一个.
    pub fn new(base: String, mut files: Vec<Classified>) -> Result<Self> {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let mut kept: Vec<Classified> = Vec::with_capacity(2);
        for f in files {
            if let Some(prev) = kept.iter().find(|k| k.fields.format == f.fields.format) {
                warn!(
                    "Duplicate `{}`: keeping `{}`, ignoring `{}`",
                    f.file_name,
                    prev.path.display(),
                    f.path.display()
                );
                continue;
            }
            kept.push(f);
        }
        kept.sort_by_key(|f| f.fields.format);

        let formats: Vec<FileFormat> = kept.iter().map(|f| f.fields.format).collect();
        let reason = match formats.as_slice() {
            [FileFormat::NiiGz] | [FileFormat::Img, FileFormat::Hdr] => None,
            [] => Some(GroupError::Empty),
            [FileFormat::Img] => Some(GroupError::MissingHeader),
            [FileFormat::Hdr] => Some(GroupError::MissingImage),
            _ => Some(GroupError::MixedFormats),
        };
        match reason {
            None => Ok(Self { base, files: kept }),
            Some(reason) => Err(Error::InvalidGroup { base, reason }),
        }
    }

    /// 规范基础文件名 (不含扩展名).
    #[inline]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// 组内文件, 按格式排序 (`.img` 在 `.hdr` 之前).
    #[inline]
    pub fn files(&self) -> &[Classified] {
        &self.files
    }

    /// 解析字段. 组内所有文件除格式外相同, 取第一个.
    #[inline]
    pub fn fields(&self) -> &ScanFields {
        &self.files[0].fields
    }

    /// 按格式取出组内文件.
    ///
    /// [`VolumeGroup::new`] 保证组内要么只有一个 `.nii.gz`, 要么是按格式排序的 `.img` 和 `.hdr`.
    pub fn volume_files(&self) -> VolumeFiles<'_> {
        match self.files.as_slice() {
            [img, hdr] => VolumeFiles::Pair {
                hdr: &hdr.path,
                img: &img.path,
            },
            _ => VolumeFiles::Single(&self.files[0].path),
        }
    }
}

/// 一次归档遍历的结果.
#[derive(Clone, Debug, Default)]
pub struct ArchiveScan {
    /// 合法的体数据组, 按基础文件名排序.
    pub groups: Vec<VolumeGroup>,

    /// 扩展名像扫描文件, 但无法识别的文件.
    pub unrecognised: Vec<PathBuf>,

    /// 位于派生目录, 或文件名表明为派生数据而被排除的文件数.
    pub derived: usize,

    /// 不完整或不一致而被丢弃的组.
    pub invalid_groups: Vec<String>,
}

/// 遍历 `original_root`, 分类并按基础文件名分组.
///
/// 单个条目的错误只记录日志. `original_root` 不存在时返回 `Err`.
pub fn scan_archive<P: AsRef<Path>>(original_root: P) -> Result<ArchiveScan> {
    let root = original_root.as_ref();
    if !root.is_dir() {
        return Err(Error::ArchiveNotFound(root.to_path_buf()));
    }

    let mut scan = ArchiveScan::default();
    let mut by_base: BTreeMap<String, Vec<Classified>> = BTreeMap::new();
    for path in scan_files(root) {
        let rel = path.strip_prefix(root).unwrap_or(&path);
        let Some(mut classified) = classify_path(rel) else {
            warn!("Unrecognised scan file `{}`", path.display());
            scan.unrecognised.push(path);
            continue;
        };
        if !classified.is_raw() {
            debug!("Skipping derived file `{}`", path.display());
            scan.derived += 1;
            continue;
        }
        classified.path = path;
        by_base
            .entry(classified.fields.base_name.clone())
            .or_default()
            .push(classified);
    }

    for (base, files) in by_base {
        match VolumeGroup::new(base, files) {
            Ok(group) => scan.groups.push(group),
            Err(Error::InvalidGroup { base, reason }) => {
                warn!("Skipping volume `{base}`: {reason}");
                scan.invalid_groups.push(base);
            }
            Err(e) => return Err(e),
        }
    }
    info!(
        "Found {} volumes ({} unrecognised files, {} derived files, {} invalid groups)",
        scan.groups.len(),
        scan.unrecognised.len(),
        scan.derived,
        scan.invalid_groups.len()
    );
    Ok(scan)
}

/// 按扩展名独立枚举 `root` 下的扫描文件, 不做分类. 派生目录不会被跳过.
///
/// 结果按路径排序.
pub fn scan_files<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    WalkDir::new(root.as_ref())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(FileFormat::from_file_name)
                .is_some()
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// 用于与目录表比对的文件列表: [`scan_files`] 去掉按路径或文件名判定为派生数据的文件.
///
/// 无法识别的文件仍然保留, 它们会在比对时作为 "不在目录表中" 报告.
pub fn raw_listing<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let root = root.as_ref();
    let files = scan_files(root);
    let total = files.len();
    let listing: Vec<PathBuf> = files
        .into_iter()
        .filter(|path| {
            let rel = path.strip_prefix(root).unwrap_or(path);
            classify_path(rel).map_or(true, |c| c.is_raw())
        })
        .collect();
    debug!(
        "Listing {} of {total} scan files ({} derived)",
        listing.len(),
        total - listing.len()
    );
    listing
}
