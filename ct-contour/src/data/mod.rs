use std::ops::Index;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, ArrayView, Axis, Ix3};

use crate::error::IndexOutOfRange;
use crate::{Idx2d, Idx3d};

pub mod slice;
pub mod window;

pub use slice::{ImgWriteRaw, ImgWriteVis, OwnedSlice, SliceView};

pub use window::IntensityWindow;

/// 三维强度体数据. 体素值以 `u16` 保存, 按照 (切片, 行, 列) 组织.
///
/// 体数据在构建完成后不可变. 外部只能获得切片的借用视图或拥有所有权的副本.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<u16>,
    spacing: Option<f64>,
    scaling_factor: u32,
    source: PathBuf,
}

impl Index<Idx3d> for Volume {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl Volume {
    /// 直接创建体数据.
    ///
    /// `spacing` 为相邻切片间距 (毫米), 未知时为 `None`.
    /// `scaling_factor` 为各切片相对原始分辨率的放大倍数.
    pub fn new<P: Into<PathBuf>>(
        data: Array3<u16>,
        spacing: Option<f64>,
        scaling_factor: u32,
        source: P,
    ) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        Self {
            data,
            spacing,
            scaling_factor,
            source: source.into(),
        }
    }

    /// 获取数据形状大小 (切片数, 高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let &[z, h, w] = self.data.shape() else {
            unreachable!()
        };
        (z, h, w)
    }

    /// 获取切片形状大小 (高, 宽).
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取切片个数.
    #[inline]
    pub fn slice_count(&self) -> usize {
        self.shape().0
    }

    /// 相邻切片间距, 以毫米为单位.
    #[inline]
    pub fn spacing(&self) -> Option<f64> {
        self.spacing
    }

    /// 切片相对于原始图像的放大倍数.
    #[inline]
    pub fn scaling_factor(&self) -> u32 {
        self.scaling_factor
    }

    /// 体数据来源的文件夹.
    #[inline]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// 获取第 `index` 层切片视图.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, index: usize) -> SliceView<'_> {
        SliceView::new(self.data.index_axis(Axis(0), index))
    }

    /// 获取第 `index` 层切片视图. 越界时返回错误.
    pub fn try_slice_at(&self, index: usize) -> Result<SliceView<'_>, IndexOutOfRange> {
        let len = self.slice_count();
        if index < len {
            Ok(self.slice_at(index))
        } else {
            Err(IndexOutOfRange { index, len })
        }
    }

    /// 获取能按升序迭代所有切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = SliceView<'_>> {
        self.data.axis_iter(Axis(0)).map(SliceView::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u16, Ix3> {
        self.data.view()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<u16> {
        self.data
    }

    /// 逐像素计算强度沿切片方向的标准差 (总体标准差).
    ///
    /// 返回值形状为 (高, 宽). 体数据为空时返回全零数组.
    pub fn intensity_stddev(&self) -> Array2<f64> {
        let (z, h, w) = self.shape();
        if z == 0 {
            return Array2::zeros((h, w));
        }
        let n = z as f64;
        let mut sum = Array2::<f64>::zeros((h, w));
        let mut sq = Array2::<f64>::zeros((h, w));
        for sli in self.data.axis_iter(Axis(0)) {
            sum.zip_mut_with(&sli, |s, &v| *s += v as f64);
            sq.zip_mut_with(&sli, |s, &v| *s += (v as f64) * (v as f64));
        }
        ndarray::Zip::from(&mut sum).and(&sq).for_each(|s, &q| {
            let mean = *s / n;
            *s = (q / n - mean * mean).max(0.0).sqrt();
        });
        sum
    }
}
