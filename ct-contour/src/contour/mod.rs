//! 轮廓提取.
//!
//! 流程: 8-bit 灰度 → 高斯模糊 → CLAHE → 阈值二值化 → 边界跟踪 → 按面积排序.
//! 该过程不会失败; 没有前景时返回空集合.

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

use crate::config::ExtractParams;
use crate::data::window::IntensityWindow;
use crate::OwnedSlice;

pub mod clahe;
mod trace;

pub use clahe::clahe;
pub use trace::{binarize, shoelace_area, trace, Contour, ContourSet, Point};

/// 将阈值调整 `delta`, 结果在 `0` 和 `255` 处饱和.
#[inline]
pub fn adjust_threshold(threshold: u8, delta: i32) -> u8 {
    (threshold as i32).saturating_add(delta).clamp(0, u8::MAX as i32) as u8
}

/// 从 8-bit 灰度图提取按面积降序排列的轮廓集合.
pub fn extract(img: &GrayImage, threshold: u8, params: &ExtractParams) -> ContourSet {
    if img.width() == 0 || img.height() == 0 {
        return ContourSet::default();
    }
    let blurred = gaussian_blur_f32(img, params.blur_sigma);
    let equalized = clahe(&blurred, params.clahe_clip, params.clahe_tiles);
    trace(&binarize(&equalized, threshold))
}

/// 通过窗口 `window` 将切片映射为 8-bit 灰度后提取轮廓.
#[inline]
pub fn extract_slice(
    slice: &OwnedSlice,
    threshold: u8,
    window: &IntensityWindow,
    params: &ExtractParams,
) -> ContourSet {
    extract(&slice.to_gray8(window), threshold, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_adjust_threshold_saturates() {
        assert_eq!(adjust_threshold(255, 1), 255);
        assert_eq!(adjust_threshold(0, -1), 0);
        assert_eq!(adjust_threshold(70, 1), 71);
        assert_eq!(adjust_threshold(70, -1), 69);
    }

    #[test]
    fn test_all_black_is_empty() {
        let img = GrayImage::new(40, 30);
        assert!(extract(&img, 70, &ExtractParams::default()).is_empty());
    }

    #[test]
    fn test_all_white_is_single_frame() {
        let img = GrayImage::from_pixel(40, 30, Luma([255]));
        let set = extract(&img, 0, &ExtractParams::default());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().area(), (39 * 29) as f64);
    }

    #[test]
    fn test_bright_disc_is_found() {
        let img = GrayImage::from_fn(64, 64, |x, y| {
            let (dx, dy) = (x as i32 - 32, y as i32 - 32);
            Luma([if dx * dx + dy * dy < 200 { 220 } else { 10 }])
        });
        let slice = OwnedSlice::from_gray8(&img);
        let set = extract_slice(
            &slice,
            70,
            &IntensityWindow::clip_8bit(),
            &ExtractParams::default(),
        );
        assert!(!set.is_empty());
        let areas = set.areas();
        assert!(areas.windows(2).all(|w| w[0] >= w[1]));
        assert!(areas[0] > 300.0);
    }
}
