//! 逐图像的像素统计.
//!
//! 每张切片图像一行: 像素均值、总体标准差、宽、高, 以及像素直方图计数的偏度.
//! 标签取自图像所在目录名 (`<Orientation>/<label>/*.png`).

use super::png_files;
use crate::{Diagnosis, Error, Result};
use image::GrayImage;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 直方图的箱数.
pub const HISTOGRAM_BINS: usize = 10;

/// 一张图像的统计量.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageStats {
    /// 像素均值.
    pub mean: f64,
    /// 像素总体标准差.
    pub std: f64,
    /// 宽.
    pub width: u32,
    /// 高.
    pub height: u32,
    /// 像素直方图计数的偏度. 计数全部相等时没有定义.
    pub skew: Option<f64>,
    /// 诊断标签名.
    pub label: String,
    /// 图像路径.
    pub path: String,
}

/// 等宽直方图, `bins` 个箱覆盖 `[min, max]`, 最后一个箱含右端点.
///
/// 所有像素相等时范围扩展为 `[v - 0.5, v + 0.5]`. 没有像素时全部为 0.
pub fn histogram(pixels: &[u8], bins: usize) -> Vec<u64> {
    let mut counts = vec![0u64; bins];
    let (Some(&lo), Some(&hi)) = (pixels.iter().min(), pixels.iter().max()) else {
        return counts;
    };
    if bins == 0 {
        return counts;
    }
    let (lo, hi) = if lo == hi {
        (lo as f64 - 0.5, hi as f64 + 0.5)
    } else {
        (lo as f64, hi as f64)
    };
    let width = hi - lo;
    for &p in pixels {
        let i = ((p as f64 - lo) / width * bins as f64) as usize;
        counts[i.min(bins - 1)] += 1;
    }
    counts
}

/// 有偏样本偏度 `m3 / m2^1.5`. 二阶中心矩为 0 (或没有样本) 时返回 `None`.
pub fn skewness(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let (m2, m3) = xs.iter().fold((0.0, 0.0), |(m2, m3), &x| {
        let d = x - mean;
        (m2 + d * d, m3 + d * d * d)
    });
    let (m2, m3) = (m2 / n, m3 / n);
    if m2 <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }
    Some(m3 / m2.powf(1.5))
}

impl ImageStats {
    /// 统计一张灰度图.
    pub fn of_image(img: &GrayImage, label: Diagnosis, path: &Path) -> Self {
        let pixels = img.as_raw();
        let n = pixels.len().max(1) as f64;
        let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / n;
        let var = pixels
            .iter()
            .map(|&p| {
                let d = p as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let counts: Vec<f64> = histogram(pixels, HISTOGRAM_BINS)
            .into_iter()
            .map(|c| c as f64)
            .collect();
        let (width, height) = img.dimensions();
        Self {
            mean,
            std: var.sqrt(),
            width,
            height,
            skew: skewness(&counts),
            label: label.as_str().to_owned(),
            path: path.to_string_lossy().into_owned(),
        }
    }
}

/// 图像所在目录名对应的诊断. 无法识别时为 `Unknown`.
fn label_of(path: &Path) -> Diagnosis {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .and_then(Diagnosis::from_label)
        .unwrap_or(Diagnosis::Unknown)
}

fn stats_one(path: &Path) -> Option<ImageStats> {
    match image::open(path) {
        Ok(img) => Some(ImageStats::of_image(&img.to_luma8(), label_of(path), path)),
        Err(e) => {
            warn!("Failed to read `{}`: {e}", path.display());
            None
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        fn stats_all(files: &[PathBuf]) -> Vec<ImageStats> {
            files.par_iter().filter_map(|f| stats_one(f)).collect()
        }
    } else {
        fn stats_all(files: &[PathBuf]) -> Vec<ImageStats> {
            files.iter().filter_map(|f| stats_one(f)).collect()
        }
    }
}

/// 统计 `root` 下所有 PNG 图像, 按路径排序. 无法读取的图像只记录日志.
///
/// `root` 不存在时返回 `Err`.
pub fn image_stats<P: AsRef<Path>>(root: P) -> Result<Vec<ImageStats>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::MissingDir(root.to_path_buf()));
    }
    let files = png_files(root);
    let stats = stats_all(&files);
    info!("Collected stats of {}/{} images", stats.len(), files.len());
    Ok(stats)
}

/// 写为 CSV. 父目录不存在时创建.
pub fn write_stats<P: AsRef<Path>>(stats: &[ImageStats], dest: P) -> Result<()> {
    let dest = dest.as_ref();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(dest)?;
    for row in stats {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Image stats with {} rows written to `{}`", stats.len(), dest.display());
    Ok(())
}
