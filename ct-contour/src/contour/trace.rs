use std::cmp::Reverse;

use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use ordered_float::OrderedFloat;

use crate::consts::gray::{BINARY_BACKGROUND, BINARY_FOREGROUND};

/// 平面整数点 `(x, y)`. `x` 向右增长, `y` 向下增长.
pub type Point = (i32, i32);

/// 闭合轮廓: 首尾隐式相连的点链, 以及其包围面积.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contour {
    points: Vec<Point>,
    area: f64,
}

/// 鞋带公式求闭合多边形面积 (绝对值).
pub fn shoelace_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(&(x0, y0), &(x1, y1))| x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

impl Contour {
    /// 由点链创建, 面积自动计算.
    pub fn new(points: Vec<Point>) -> Self {
        let area = shoelace_area(&points);
        Self { points, area }
    }

    /// 点链.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// 包围面积.
    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// 点数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否没有任何点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 取出点链.
    #[inline]
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }
}

/// 按面积降序排列的轮廓集合. 面积相同时保持发现顺序.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContourSet {
    contours: Vec<Contour>,
}

impl ContourSet {
    /// 由任意顺序的轮廓创建, 内部做稳定排序.
    pub fn new(mut contours: Vec<Contour>) -> Self {
        contours.sort_by_key(|c| Reverse(OrderedFloat(c.area)));
        Self { contours }
    }

    /// 轮廓个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// 第 `rank` 大的轮廓.
    #[inline]
    pub fn get(&self, rank: usize) -> Option<&Contour> {
        self.contours.get(rank)
    }

    /// 按排名升序迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Contour> {
        self.contours.iter()
    }

    /// 所有轮廓的面积, 按排名升序.
    pub fn areas(&self) -> Vec<f64> {
        self.contours.iter().map(Contour::area).collect()
    }
}

/// 二值化: 严格大于 `threshold` 的像素为前景.
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] > threshold {
            BINARY_FOREGROUND
        } else {
            BINARY_BACKGROUND
        };
    }
    out
}

/// 跟踪二值图像中的全部边界 (外边界和孔洞边界), 保留完整点链.
///
/// 所有非零像素都视为前景. 图像四周先补一圈 1 像素背景再跟踪,
/// 贴住图像边缘 (包括同时贴住左右两边) 的区域也能闭合; 点坐标最终映射回原图.
pub fn trace(binary: &GrayImage) -> ContourSet {
    let (w, h) = binary.dimensions();
    if w == 0 || h == 0 {
        return ContourSet::default();
    }
    let padded = GrayImage::from_fn(w + 2, h + 2, |x, y| {
        if x == 0 || y == 0 || x > w || y > h {
            Luma([BINARY_BACKGROUND])
        } else {
            *binary.get_pixel(x - 1, y - 1)
        }
    });
    let (max_x, max_y) = (w as i32 - 1, h as i32 - 1);
    let contours = find_contours::<i32>(&padded)
        .into_iter()
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| ((p.x - 1).clamp(0, max_x), (p.y - 1).clamp(0, max_y)))
                .collect();
            Contour::new(points)
        })
        .collect();
    ContourSet::new(contours)
}
