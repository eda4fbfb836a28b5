//! 断点续跑与输出路径.

use crate::orient::Orientation;
use crate::Diagnosis;
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 切片文件名: `Slice_<i>_<base>_<orientation>_img.png`.
pub fn slice_file_name(index: usize, base: &str, orientation: Orientation) -> String {
    format!("Slice_{index}_{base}_{}_img.png", orientation.file_tag())
}

/// 切片所在目录: `<output_root>/<Orientation>/<label>`.
pub fn slice_dir(output_root: &Path, orientation: Orientation, diagnosis: Diagnosis) -> PathBuf {
    output_root
        .join(orientation.dir_name())
        .join(diagnosis.as_str())
}

/// `output_root` 下是否已有该体数据的输出.
///
/// 遍历整个输出目录, 文件名包含 `_<base>_` 即视为已完成.
/// 两侧的下划线避免 `mpr-1` 误匹配 `mpr-10`.
pub fn already_converted(output_root: &Path, base: &str) -> bool {
    if !output_root.is_dir() {
        return false;
    }
    let needle = format!("_{base}_");
    WalkDir::new(output_root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable output entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| {
            entry
                .file_name()
                .to_str()
                .map_or(false, |name| name.contains(&needle))
        })
}
