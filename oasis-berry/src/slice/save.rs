//! 图像的持久化存储.

use super::VolumeSlice;
use crate::GrayWindow;
use image::{GrayImage, ImageResult, Luma};
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好"
/// 的方式保存, 而不是 "as is" 的方式. 对于 [`VolumeSlice`] 这类以任意强度存储的切片,
/// 保存时会以切片自身的最小值和最大值为窗口归一化到 8 位灰度.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

impl VolumeSlice<'_> {
    /// 栅格化为灰度图.
    ///
    /// 图像是切片的转置, 且原点在左下: 图像宽对应切片第一轴, 图像第 0 行对应切片第二轴的最后一个索引.
    /// 平坦切片 (没有有限像素, 或所有像素相等) 全部为黑色; 非有限像素为黑色.
    pub fn to_gray_image(&self) -> GrayImage {
        let (n0, n1) = self.shape();
        let mut buf = GrayImage::new(n0 as u32, n1 as u32);
        let window = self
            .min_max()
            .and_then(|(lo, hi)| GrayWindow::from_range(lo, hi));
        if let Some(window) = window {
            for ((i, j), &v) in self.indexed_iter() {
                let gray = window.eval(v).unwrap_or(u8::MIN);
                buf.put_pixel(i as u32, (n1 - 1 - j) as u32, Luma([gray]));
            }
        }
        buf
    }
}

/// 逐切片 min/max 归一化, 转置, 原点在左下.
impl ImgWriteVis for VolumeSlice<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_gray_image().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_transposed_origin_lower() {
        // 切片形状 (3, 2): 图像宽 3, 高 2.
        let a = array![[0.0f32, 10.0], [2.0, 4.0], [6.0, 8.0]];
        let img = VolumeSlice::new(a.view()).to_gray_image();
        assert_eq!(img.dimensions(), (3, 2));
        // 切片 (0, 0) 最小, 在左下.
        assert_eq!(img.get_pixel(0, 1).0, [0]);
        // 切片 (0, 1) 最大, 在左上.
        assert_eq!(img.get_pixel(0, 0).0, [255]);
        // 切片 (2, 0) = 6.0, 在右下.
        assert_eq!(img.get_pixel(2, 1).0, [(0.6f32 * 255.0) as u8]);
    }

    #[test]
    fn test_flat_is_black() {
        let a = Array2::<f32>::from_elem((4, 5), 3.0);
        let img = VolumeSlice::new(a.view()).to_gray_image();
        assert!(img.pixels().all(|p| p.0 == [0]));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Slice_0_x_axial_img.png");
        let a = Array2::from_shape_fn((8, 6), |(i, j)| (i * j) as f32);
        VolumeSlice::new(a.view()).save(&path).unwrap();
        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(back.dimensions(), (8, 6));
    }
}
