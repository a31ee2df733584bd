//! 曲线拟合.
//!
//! 给定一系列点 `(x, y)`, 该模块可以拟合出一条三次样条曲线.
//! 手绘笔画这类 `x` 不单调的点列使用参数化形式 [`parametric_spline`].

use ndarray::{Array1, ArrayView1};

mod cubic_spline;

type VecPair<T> = (Vec<T>, Vec<T>);

/// 拟合三次样条曲线.
///
/// `x` 是严格递增 (或递减) 的数组, `y` 是对应函数值, `k` 为两点之间的拟合点的数量.
pub fn cubic_spline_f64(x: ArrayView1<f64>, y: ArrayView1<f64>, k: u32) -> VecPair<f64> {
    cubic_spline::CubicSplineImp::<f64>::new(x.view(), y.view(), k).make_spline()
}

/// 以累积弦长为参数, 分别拟合 `x(t)` 和 `y(t)` 两条三次样条曲线.
///
/// 相邻重复点会被合并. 合并后不足三个点时返回 `None`.
/// `k` 为相邻两点之间的拟合点数量.
pub fn parametric_spline(points: &[(f64, f64)], k: u32) -> Option<Vec<(f64, f64)>> {
    let mut uniq: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in points {
        if uniq.last() != Some(&p) {
            uniq.push(p);
        }
    }
    if uniq.len() < 3 || k == 0 {
        return None;
    }

    let mut t = Vec::with_capacity(uniq.len());
    let mut acc = 0.0;
    t.push(acc);
    for w in uniq.windows(2) {
        let (dx, dy) = (w[1].0 - w[0].0, w[1].1 - w[0].1);
        acc += dx.hypot(dy);
        t.push(acc);
    }

    let t = Array1::from_vec(t);
    let xs = Array1::from_iter(uniq.iter().map(|p| p.0));
    let ys = Array1::from_iter(uniq.iter().map(|p| p.1));
    let (_, fx) = cubic_spline_f64(t.view(), xs.view(), k);
    let (_, fy) = cubic_spline_f64(t.view(), ys.view(), k);
    Some(fx.into_iter().zip(fy).collect())
}
