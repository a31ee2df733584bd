//! 感兴趣区域 (ROI) 的截取.

use crate::error::EmptyRegion;
use crate::OwnedSlice;

/// 轴对齐矩形区域. `(x, y)` 为左上角, `x` 为列方向, `y` 为行方向.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Roi {
    /// 左上角列坐标.
    pub x: usize,
    /// 左上角行坐标.
    pub y: usize,
    /// 宽.
    pub width: usize,
    /// 高.
    pub height: usize,
}

impl Roi {
    /// 直接创建.
    #[inline]
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 面积是否为零.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 截取切片 `slice` 与 `roi` 的重叠部分.
///
/// `roi` 面积为零, 或与切片完全不相交时, 返回 [`EmptyRegion`].
pub fn apply(slice: &OwnedSlice, roi: Roi) -> Result<OwnedSlice, EmptyRegion> {
    if roi.is_empty() {
        return Err(EmptyRegion(roi));
    }
    let cropped = slice.crop((roi.y, roi.x), (roi.height, roi.width));
    if cropped.is_empty() {
        Err(EmptyRegion(roi))
    } else {
        Ok(cropped)
    }
}

/// 交互式选择矩形的外部协作者 (通常由界面实现).
pub trait RoiSelector {
    /// 在切片 `slice` (第 `slice_index` 个) 上让用户选择一个矩形.
    ///
    /// 返回零面积矩形表示用户取消.
    fn select(&mut self, slice: &OwnedSlice, slice_index: usize) -> Roi;
}

impl<F> RoiSelector for F
where
    F: FnMut(&OwnedSlice, usize) -> Roi,
{
    #[inline]
    fn select(&mut self, slice: &OwnedSlice, slice_index: usize) -> Roi {
        self(slice, slice_index)
    }
}

/// 会话级 ROI: 激活后, 每次切换切片都以同一矩形截取.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StickyRoi {
    roi: Option<Roi>,
}

impl StickyRoi {
    /// 当前激活的 ROI.
    #[inline]
    pub fn get(&self) -> Option<Roi> {
        self.roi
    }

    /// 是否已激活.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.roi.is_some()
    }

    /// 激活 `roi`. 零面积矩形被忽略, 此时返回 `false`.
    pub fn set(&mut self, roi: Roi) -> bool {
        if roi.is_empty() {
            false
        } else {
            self.roi = Some(roi);
            true
        }
    }

    /// 清除 ROI.
    #[inline]
    pub fn clear(&mut self) {
        self.roi = None;
    }

    /// 以当前 ROI 截取 `slice`; 未激活时原样返回副本.
    pub fn crop(&self, slice: &OwnedSlice) -> Result<OwnedSlice, EmptyRegion> {
        match self.roi {
            Some(roi) => apply(slice, roi),
            None => Ok(slice.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OwnedSlice {
        OwnedSlice::new(ndarray::Array2::from_shape_fn((10, 20), |(r, c)| {
            (r * 100 + c) as u16
        }))
    }

    #[test]
    fn test_apply_inside_and_partial() {
        let s = sample();
        let c = apply(&s, Roi::new(2, 3, 4, 5)).unwrap();
        assert_eq!(c.shape(), (5, 4));
        assert_eq!(c[(0, 0)], 302);

        let c = apply(&s, Roi::new(18, 8, 10, 10)).unwrap();
        assert_eq!(c.shape(), (2, 2));
    }

    #[test]
    fn test_apply_empty() {
        let s = sample();
        assert!(apply(&s, Roi::new(1, 1, 0, 4)).is_err());
        let roi = Roi::new(50, 50, 4, 4);
        assert_eq!(apply(&s, roi).err(), Some(EmptyRegion(roi)));
    }

    #[test]
    fn test_sticky_roi() {
        let s = sample();
        let mut sticky = StickyRoi::default();
        assert_eq!(sticky.crop(&s).unwrap(), s);
        assert!(!sticky.set(Roi::new(0, 0, 0, 0)));
        assert!(!sticky.is_active());
        assert!(sticky.set(Roi::new(0, 0, 3, 2)));
        assert_eq!(sticky.crop(&s).unwrap().shape(), (2, 3));
        sticky.clear();
        assert_eq!(sticky.get(), None);
    }

    #[test]
    fn test_closure_selector() {
        let mut sel = |_: &OwnedSlice, i: usize| Roi::new(i, 0, 1, 1);
        assert_eq!(sel.select(&sample(), 3), Roi::new(3, 0, 1, 1));
    }
}
