//! 归档目录布局.

use crate::consts::layout::{CATALOG_FILE, ORIGINAL_DIR, PREPROCESSED_DIR, RESULTS_DIR, STATS_FILE};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 一个 OASIS 归档.
///
/// ```text
/// <root>/
///   Original/       原始扫描, 各代际一个子目录
///   Preprocessed/   切片输出, 目录表与逐图像统计表
///   RESULTS/        缩放后的切片
///   *.csv, *.xlsx   临床表, 可在任意层级
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    /// 打开归档. 根目录不存在时返回 [`Error::ArchiveNotFound`].
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::ArchiveNotFound(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// 根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 原始扫描目录.
    #[inline]
    pub fn original(&self) -> PathBuf {
        self.root.join(ORIGINAL_DIR)
    }

    /// 切片输出目录.
    #[inline]
    pub fn preprocessed(&self) -> PathBuf {
        self.root.join(PREPROCESSED_DIR)
    }

    /// 目录表路径.
    #[inline]
    pub fn catalog_path(&self) -> PathBuf {
        self.preprocessed().join(CATALOG_FILE)
    }

    /// 缩放后切片的输出目录.
    #[inline]
    pub fn results(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    /// 逐图像统计表路径.
    #[inline]
    pub fn stats_path(&self) -> PathBuf {
        self.preprocessed().join(STATS_FILE)
    }
}
