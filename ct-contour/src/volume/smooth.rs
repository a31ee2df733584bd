//! 曲率流 (curvature flow) 平滑.
//!
//! 每次迭代按 `I += dt * κ|∇I|` 更新, 其中
//! `κ|∇I| = (Ixx·Iy² − 2·Ix·Iy·Ixy + Iyy·Ix²) / (Ix² + Iy²)`.
//! 导数使用中心差分, 边界像素复制延拓.

use ndarray::{Array2, ArrayView2};

use crate::config::SmoothParams;

/// 梯度模平方低于该值时视为平坦区域, 不更新.
const FLAT_EPS: f64 = 1e-12;

#[inline]
fn at(img: &Array2<f64>, r: isize, c: isize) -> f64 {
    let (h, w) = img.dim();
    let r = r.clamp(0, h as isize - 1) as usize;
    let c = c.clamp(0, w as isize - 1) as usize;
    img[(r, c)]
}

/// 一次迭代中, 像素 `(r, c)` 的更新量 `κ|∇I|`.
fn curvature_term(img: &Array2<f64>, r: isize, c: isize) -> f64 {
    let p = at(img, r, c);
    let (n, s) = (at(img, r - 1, c), at(img, r + 1, c));
    let (wv, e) = (at(img, r, c - 1), at(img, r, c + 1));

    let ix = (e - wv) / 2.0;
    let iy = (s - n) / 2.0;
    let grad2 = ix * ix + iy * iy;
    if grad2 < FLAT_EPS {
        return 0.0;
    }
    let ixx = e - 2.0 * p + wv;
    let iyy = s - 2.0 * p + n;
    let ixy = (at(img, r + 1, c + 1) - at(img, r + 1, c - 1) - at(img, r - 1, c + 1)
        + at(img, r - 1, c - 1))
        / 4.0;
    (ixx * iy * iy - 2.0 * ix * iy * ixy + iyy * ix * ix) / grad2
}

/// 对单个切片执行曲率流平滑. 结果四舍五入并截断到 `u16` 范围.
pub fn curvature_flow(input: ArrayView2<u16>, params: &SmoothParams) -> Array2<u16> {
    let (h, w) = input.dim();
    if h == 0 || w == 0 {
        return input.to_owned();
    }
    let mut cur = input.mapv(|v| v as f64);
    let mut next = cur.clone();
    for _ in 0..params.iterations {
        for ((r, c), v) in next.indexed_iter_mut() {
            let (r, c) = (r as isize, c as isize);
            *v = at(&cur, r, c) + params.time_step * curvature_term(&cur, r, c);
        }
        std::mem::swap(&mut cur, &mut next);
    }
    cur.mapv(|v| v.round().clamp(0.0, u16::MAX as f64) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_constant_image_unchanged() {
        let img = Array2::from_elem((5, 6), 1234u16);
        assert_eq!(curvature_flow(img.view(), &SmoothParams::default()), img);
    }

    #[test]
    fn test_straight_edge_unchanged() {
        // 直线边界的曲率为 0.
        let img = Array2::from_shape_fn((6, 6), |(_, c)| if c < 3 { 0u16 } else { 1000 });
        assert_eq!(curvature_flow(img.view(), &SmoothParams::default()), img);
    }

    #[test]
    fn test_convex_corner_is_eroded() {
        let mut img = Array2::from_elem((8, 8), 100u16);
        for r in 3..5 {
            for c in 3..5 {
                img[(r, c)] = 1100;
            }
        }
        let out = curvature_flow(img.view(), &SmoothParams::default());
        assert!(out[(3, 3)] < 1100);
        assert!(out[(3, 3)] > 100);
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let img = array![[1u16, 9], [300, 7]];
        let p = SmoothParams {
            iterations: 0,
            time_step: 0.05,
        };
        assert_eq!(curvature_flow(img.view(), &p), img);
    }
}
