//! 切片图像统一缩放为 `side × side` 的灰度图.

use super::png_files;
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::GrayImage;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// 一次缩放的汇总.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResizeReport {
    /// 找到的图像数.
    pub total: usize,

    /// 写出的图像数.
    pub resized: usize,

    /// 目标已存在而跳过的图像数.
    pub skipped: usize,

    /// 失败的图像及原因.
    pub failures: Vec<(PathBuf, String)>,
}

enum Outcome {
    Resized,
    Skipped,
    Failed(PathBuf, String),
}

/// 双三次插值缩放到 `side × side`. 不保持宽高比.
#[inline]
pub fn resize_gray(img: &GrayImage, side: u32) -> GrayImage {
    imageops::resize(img, side, side, FilterType::CatmullRom)
}

fn resize_one(src: &Path, src_root: &Path, dst_root: &Path, side: u32) -> Outcome {
    let rel = src.strip_prefix(src_root).unwrap_or(src);
    let dst = dst_root.join(rel);
    if dst.is_file() {
        debug!("`{}` already resized", dst.display());
        return Outcome::Skipped;
    }
    let run = || -> Result<()> {
        let img = image::open(src)?.to_luma8();
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        resize_gray(&img, side).save(&dst)?;
        Ok(())
    };
    match run() {
        Ok(()) => Outcome::Resized,
        Err(e) => {
            warn!("Failed to resize `{}`: {e}", src.display());
            Outcome::Failed(src.to_path_buf(), e.to_string())
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        fn resize_all(files: &[PathBuf], src_root: &Path, dst_root: &Path, side: u32) -> Vec<Outcome> {
            files
                .par_iter()
                .map(|f| resize_one(f, src_root, dst_root, side))
                .collect()
        }
    } else {
        fn resize_all(files: &[PathBuf], src_root: &Path, dst_root: &Path, side: u32) -> Vec<Outcome> {
            files
                .iter()
                .map(|f| resize_one(f, src_root, dst_root, side))
                .collect()
        }
    }
}

/// 把 `src_root` 下的每张 PNG 缩放后写到 `dst_root` 下的相同相对路径.
///
/// # 注意
///
/// 1. 目标文件已存在时跳过, 所以中断后可以直接重跑.
/// 2. `dst_root` 位于 `src_root` 之内时, 其中的文件不作为输入.
/// 3. 只有 `src_root` 不存在时返回 `Err`.
pub fn resize_tree<P: AsRef<Path>, Q: AsRef<Path>>(
    src_root: P,
    dst_root: Q,
    side: u32,
) -> Result<ResizeReport> {
    let (src_root, dst_root) = (src_root.as_ref(), dst_root.as_ref());
    if !src_root.is_dir() {
        return Err(Error::MissingDir(src_root.to_path_buf()));
    }
    let files: Vec<PathBuf> = png_files(src_root)
        .into_iter()
        .filter(|p| !p.starts_with(dst_root))
        .collect();
    info!(
        "Resizing {} images to {side}x{side} into `{}`",
        files.len(),
        dst_root.display()
    );

    let mut report = ResizeReport {
        total: files.len(),
        ..Default::default()
    };
    for outcome in resize_all(&files, src_root, dst_root, side) {
        match outcome {
            Outcome::Resized => report.resized += 1,
            Outcome::Skipped => report.skipped += 1,
            Outcome::Failed(path, reason) => report.failures.push((path, reason)),
        }
    }
    info!(
        "Resize finished: {} resized, {} skipped, {} failed",
        report.resized,
        report.skipped,
        report.failures.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_resize_gray() {
        let img = GrayImage::from_pixel(40, 30, Luma([200]));
        let out = resize_gray(&img, 128);
        assert_eq!(out.dimensions(), (128, 128));
        assert!(out.pixels().all(|p| p.0[0].abs_diff(200) <= 1));
    }

    #[test]
    fn test_resize_tree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("Preprocessed");
        let dst = dir.path().join("RESULTS");
        let label_dir = src.join("Axial").join("non-demented");
        fs::create_dir_all(&label_dir).unwrap();
        let good = label_dir.join("Slice_100_OAS1_0001_MR1_mpr-1_anon_axial_img.png");
        GrayImage::from_fn(40, 30, |x, y| Luma([(x + y) as u8]))
            .save(&good)
            .unwrap();
        fs::write(label_dir.join("Slice_101_broken_axial_img.png"), b"not a png").unwrap();

        let report = resize_tree(&src, &dst, 128).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.resized, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].0.ends_with("Slice_101_broken_axial_img.png"));

        let back = image::open(dst.join(good.strip_prefix(&src).unwrap()))
            .unwrap()
            .to_luma8();
        assert_eq!(back.dimensions(), (128, 128));

        let again = resize_tree(&src, &dst, 128).unwrap();
        assert_eq!(again.resized, 0);
        assert_eq!(again.skipped, 1);

        assert!(matches!(
            resize_tree(dir.path().join("nope"), &dst, 128),
            Err(Error::MissingDir(_))
        ));
    }

    #[test]
    fn test_nested_destination_is_not_input() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path();
        let dst = src.join("RESULTS");
        fs::create_dir_all(dst.join("Axial")).unwrap();
        GrayImage::new(4, 4).save(dst.join("Axial/old.png")).unwrap();
        GrayImage::new(4, 4).save(src.join("new.png")).unwrap();
        let report = resize_tree(src, &dst, 8).unwrap();
        assert_eq!(report.total, 1);
        assert!(dst.join("new.png").is_file());
    }
}
