//! 图像的持久化存储.

use crate::data::window::IntensityWindow;
use crate::{OwnedSlice, SliceView};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将经过强度窗口映射为 8-bit 灰度后保存,
/// 而不是 "as is" 的方式. 文件格式由 `path` 的扩展名决定.
pub trait ImgWriteVis {
    /// 按照窗口 `window` 将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P, window: &IntensityWindow) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
///
/// 16-bit 强度按原样保存, 因此 `path` 必须是支持 16-bit 灰度的格式 (例如 png).
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

macro_rules! impl_slice_write {
    ($($slice: ty),+) => {
        $(
            impl ImgWriteVis for $slice {
                #[inline]
                fn save<P: AsRef<Path>>(&self, path: P, window: &IntensityWindow) -> ImageResult<()> {
                    self.to_gray8(window).save(path)
                }
            }

            impl ImgWriteRaw for $slice {
                #[inline]
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    self.to_gray16().save(path)
                }
            }
        )+
    };
}

impl_slice_write!(SliceView<'_>, OwnedSlice);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_save_raw_keeps_16bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.png");
        let s = OwnedSlice::new(array![[0u16, 1000], [40000, u16::MAX]]);
        s.as_view().save_raw(&path).unwrap();
        let back = image::open(&path).unwrap().into_luma16();
        assert_eq!(OwnedSlice::from_gray16(&back), s);
    }
}
