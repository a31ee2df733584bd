//! 体数据的重定向与平面内缩放.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

/// 将体数据绕行轴旋转 270°, 同时保留输入切片轴作为切片轴.
///
/// 输出形状为 `(z, w, h)`: 切片顺序被反转, 每个切片被转置.
/// 即 `out[k, a, b] == input[z - 1 - k, b, a]`.
pub fn reorient(input: ArrayView3<u16>) -> Array3<u16> {
    let (z, h, w) = input.dim();
    Array3::from_shape_fn((z, w, h), |(k, a, b)| input[(z - 1 - k, b, a)])
}

/// 最近邻插值放大 `factor` 倍. `factor` 为 0 时按 1 处理.
pub fn resize_nearest(input: ArrayView2<u16>, factor: u32) -> Array2<u16> {
    let f = factor.max(1) as usize;
    let (h, w) = input.dim();
    Array2::from_shape_fn((h * f, w * f), |(r, c)| input[(r / f, c / f)])
}
