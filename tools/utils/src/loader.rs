//! 对 `oasis-berry::dataset` 的更一层封装. 提供更直接的归档定位方式.

use oasis_berry::dataset::{home_dataset_dir_with, ArchiveLayout};
use oasis_berry::Result;
use std::env;
use std::path::{Path, PathBuf};

/// 指定归档根目录的环境变量.
pub const ARCHIVE_DIR_ENV: &str = "OASIS_ARCHIVE_DIR";

/// 获取归档根目录.
///
/// 1. 若环境变量 `$OASIS_ARCHIVE_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/oasis`.
///
/// 两者都无法确定时返回 `None`.
pub fn archive_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(ARCHIVE_DIR_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["oasis"]),
    }
}

/// 打开归档. `root` 为 `None` 时按 [`archive_dir_from_env_or_home`] 定位.
pub fn open_archive<P: AsRef<Path>>(root: Option<P>) -> Result<ArchiveLayout> {
    let root = match root {
        Some(p) => p.as_ref().to_path_buf(),
        None => archive_dir_from_env_or_home().unwrap_or_default(),
    };
    ArchiveLayout::open(root)
}
