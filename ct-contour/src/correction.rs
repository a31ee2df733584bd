//! 手动修正: 记录用户笔画, 并将其写入工作栅格.

use image::Luma;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, BresenhamLineIter};

use crate::config::CorrectionParams;
use crate::contour::Point;
use crate::fitting::parametric_spline;
use crate::OwnedSlice;

/// 平滑显示时相邻两点之间的插值点数.
const SMOOTH_POINTS_PER_SEGMENT: u32 = 10;

/// 用户在当前切片上绘制的笔画.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotation {
    points: Vec<Point>,
    smooth: bool,
}

impl Annotation {
    /// 追加一个点.
    #[inline]
    pub fn record_point(&mut self, x: i32, y: i32) {
        self.points.push((x, y));
    }

    /// 清空所有点. 平滑显示开关保持不变.
    #[inline]
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// 按记录顺序排列的点.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// 是否没有任何点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 是否以平滑曲线显示.
    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.smooth
    }

    /// 切换平滑显示, 返回切换后的状态.
    #[inline]
    pub fn toggle_smoothing(&mut self) -> bool {
        self.smooth = !self.smooth;
        self.smooth
    }

    /// 用于显示的折线.
    ///
    /// 平滑开启且至少有三个 (不重复的) 点时返回样条曲线, 否则返回原始点.
    /// 该结果只用于显示, 不影响 [`apply_correction`].
    pub fn display_polyline(&self) -> Vec<(f64, f64)> {
        let raw: Vec<(f64, f64)> = self
            .points
            .iter()
            .map(|&(x, y)| (x as f64, y as f64))
            .collect();
        if !self.smooth {
            return raw;
        }
        parametric_spline(&raw, SMOOTH_POINTS_PER_SEGMENT).unwrap_or(raw)
    }
}

/// 在 `slice` 的副本上, 沿 `points` 依次连线绘制笔画.
///
/// 不足两个点时返回未修改的副本.
pub fn apply_correction(
    slice: &OwnedSlice,
    points: &[Point],
    params: &CorrectionParams,
) -> OwnedSlice {
    if points.len() < 2 {
        return slice.clone();
    }
    let mut canvas = slice.to_gray16();
    let color = Luma([params.value]);
    let radius = (params.stroke_width / 2) as i32;
    for w in points.windows(2) {
        let (start, end) = (
            (w[0].0 as f32, w[0].1 as f32),
            (w[1].0 as f32, w[1].1 as f32),
        );
        if radius == 0 {
            draw_line_segment_mut(&mut canvas, start, end, color);
        } else {
            for center in BresenhamLineIter::new(start, end) {
                draw_filled_circle_mut(&mut canvas, center, radius, color);
            }
        }
    }
    OwnedSlice::from_gray16(&canvas)
}
