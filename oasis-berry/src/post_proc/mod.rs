//! 切片导出后的处理: 统一缩放与逐图像统计.
//!
//! 两者都以 [`crate::convert`] 写出的 PNG 树为输入, 单张图像的错误只记录日志.

mod resize;
mod stats;

pub use resize::{resize_gray, resize_tree, ResizeReport};

pub use stats::{histogram, image_stats, skewness, write_stats, ImageStats, HISTOGRAM_BINS};

use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 枚举 `root` 下的所有 `.png` 文件, 按路径排序.
pub fn png_files<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
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
                .path()
                .extension()
                .map_or(false, |e| e.eq_ignore_ascii_case("png"))
        })
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Axial/unknown")).unwrap();
        fs::write(root.join("Axial/unknown/b.png"), b"").unwrap();
        fs::write(root.join("Axial/unknown/a.PNG"), b"").unwrap();
        fs::write(root.join("scan_catalog.csv"), b"").unwrap();
        let files = png_files(root);
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.PNG"));
        assert!(png_files(root.join("nope")).is_empty());
    }
}
