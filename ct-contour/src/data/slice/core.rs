use crate::data::window::IntensityWindow;
use crate::Idx2d;
use image::{GrayImage, ImageBuffer, Luma};
use ndarray::iter::Iter;
use ndarray::{s, Array2, ArrayView2, Ix2};
use std::ops::{Index, IndexMut};

/// 16-bit 单通道图像缓冲.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// 不可变、借用的二维强度切片.
pub struct SliceView<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::Volume`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, u16>,
}

impl Index<Idx2d> for SliceView<'_> {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 拥有所有权的二维强度切片.
///
/// 引擎中的工作栅格 (经过 ROI 裁剪或手动修正后的图像) 都以该形式存在.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedSlice {
    data: Array2<u16>,
}

impl Index<Idx2d> for OwnedSlice {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for OwnedSlice {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// 不可变方法集合.
macro_rules! impl_slice_immut {
    ($slice: ty) => {
        impl $slice {
            /// 获得 **底层** 数据的一份不可变 shallow copy.
            #[inline]
            pub fn array_view(&self) -> ArrayView2<u16> {
                self.data.view()
            }

            /// 获取可以迭代图像像素的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, u16, Ix2> {
                self.data.iter()
            }

            /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&u16> {
                self.data.get(pos)
            }

            /// 图像的分辨率 (高, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                let &[h, w] = self.data.shape() else {
                    unreachable!()
                };
                (h, w)
            }

            /// 图像的像素个数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 获得图像的高.
            #[inline]
            pub fn height(&self) -> usize {
                self.shape().0
            }

            /// 获得图像的宽.
            #[inline]
            pub fn width(&self) -> usize {
                self.shape().1
            }

            /// 以行优先规则, 获取能迭代图像所有 `(索引, 强度)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u16)> {
                self.data.indexed_iter()
            }

            /// 克隆自己, 获得一个拥有所有权的切片对象.
            pub fn to_owned_slice(&self) -> OwnedSlice {
                OwnedSlice {
                    data: self.data.to_owned(),
                }
            }

            /// 通过窗口 `window` 将切片转换为 8-bit 灰度图.
            pub fn to_gray8(&self, window: &IntensityWindow) -> GrayImage {
                let (height, width) = self.shape();
                let mut buf = GrayImage::new(width as u32, height as u32);
                for ((h, w), &v) in self.indexed_iter() {
                    buf.put_pixel(w as u32, h as u32, Luma([window.eval(v)]));
                }
                buf
            }

            /// 按原样转换为 16-bit 灰度图.
            pub fn to_gray16(&self) -> Gray16Image {
                let (height, width) = self.shape();
                let mut buf = Gray16Image::new(width as u32, height as u32);
                for ((h, w), &v) in self.indexed_iter() {
                    buf.put_pixel(w as u32, h as u32, Luma([v]));
                }
                buf
            }
        }
    };
}

impl_slice_immut!(SliceView<'_>);
impl_slice_immut!(OwnedSlice);

impl<'a> SliceView<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, u16>) -> Self {
        Self { data }
    }
}

impl OwnedSlice {
    /// 由 `(高, 宽)` 数组直接创建.
    #[inline]
    pub fn new(data: Array2<u16>) -> Self {
        Self { data }
    }

    /// 创建全部像素为 `value` 的切片.
    #[inline]
    pub fn filled((h, w): Idx2d, value: u16) -> Self {
        Self {
            data: Array2::from_elem((h, w), value),
        }
    }

    /// 由 8-bit 灰度图创建, 强度值按原样扩展为 16-bit.
    pub fn from_gray8(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        let data = Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
            img.get_pixel(c as u32, r as u32).0[0] as u16
        });
        Self { data }
    }

    /// 由 16-bit 灰度图创建.
    pub fn from_gray16(img: &Gray16Image) -> Self {
        let (w, h) = img.dimensions();
        let data = Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
            img.get_pixel(c as u32, r as u32).0[0]
        });
        Self { data }
    }

    /// 获得不可变切片引用.
    #[inline]
    pub fn as_view(&self) -> SliceView<'_> {
        SliceView::new(self.data.view())
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<u16> {
        self.data
    }

    /// 截取以 `(top, left)` 为左上角、`(h, w)` 为大小的子区域.
    ///
    /// 超出图像范围的部分被裁掉, 因此返回值可能小于请求的区域 (甚至为空).
    pub fn crop(&self, (top, left): Idx2d, (h, w): Idx2d) -> OwnedSlice {
        let (height, width) = self.shape();
        let (r0, c0) = (top.min(height), left.min(width));
        let (r1, c1) = (top.saturating_add(h).min(height), left.saturating_add(w).min(width));
        OwnedSlice {
            data: self.data.slice(s![r0..r1, c0..c1]).to_owned(),
        }
    }

    /// 图像是否为空 (高或宽为 0).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::OwnedSlice;
    use crate::data::window::IntensityWindow;
    use ndarray::array;

    #[test]
    fn test_crop_overlap_only() {
        let s = OwnedSlice::new(array![[1u16, 2, 3], [4, 5, 6], [7, 8, 9]]);
        let c = s.crop((1, 1), (5, 5));
        assert_eq!(c.into_raw(), array![[5u16, 6], [8, 9]]);

        let c = s.crop((3, 0), (2, 2));
        assert!(c.is_empty());
    }

    #[test]
    fn test_gray_conversions() {
        let s = OwnedSlice::new(array![[0u16, 70], [300, 255]]);
        let g8 = s.to_gray8(&IntensityWindow::clip_8bit());
        assert_eq!(g8.get_pixel(1, 0).0[0], 70);
        assert_eq!(g8.get_pixel(0, 1).0[0], 255);

        let back = OwnedSlice::from_gray16(&s.to_gray16());
        assert_eq!(back, s);

        let widened = OwnedSlice::from_gray8(&g8);
        assert_eq!(widened[(1, 0)], 255);
        assert_eq!(widened[(0, 1)], 70);
    }
}
