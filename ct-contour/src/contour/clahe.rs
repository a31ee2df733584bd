//! 限制对比度自适应直方图均衡 (CLAHE).
//!
//! 图像被划分为 `tiles × tiles` 个分块, 每个分块独立计算裁剪后的直方图均衡查找表,
//! 像素值由相邻四个分块的查找表双线性插值得到. 图像边长不能被分块数整除时,
//! 最后一行 (列) 的分块只包含实际存在的像素.

use image::{GrayImage, Luma};

const BINS: usize = 256;

type Lut = [u8; BINS];

/// 分块网格的几何信息.
#[derive(Copy, Clone, Debug)]
struct Grid {
    tile_w: usize,
    tile_h: usize,
    tiles_x: usize,
    tiles_y: usize,
}

impl Grid {
    fn new(width: usize, height: usize, tiles: usize) -> Self {
        let tiles = tiles.max(1);
        let tile_w = width.div_ceil(tiles).max(1);
        let tile_h = height.div_ceil(tiles).max(1);
        Self {
            tile_w,
            tile_h,
            tiles_x: width.div_ceil(tile_w),
            tiles_y: height.div_ceil(tile_h),
        }
    }
}

/// 将直方图中超过 `limit` 的部分裁掉, 并均匀地重新分配到所有 bin.
fn clip_histogram(hist: &mut [u32; BINS], limit: u32) {
    let mut clipped = 0u32;
    for h in hist.iter_mut() {
        if *h > limit {
            clipped += *h - limit;
            *h = limit;
        }
    }

    let batch = clipped / BINS as u32;
    let mut residual = clipped - batch * BINS as u32;
    for h in hist.iter_mut() {
        *h += batch;
    }
    if residual > 0 {
        let step = (BINS / residual as usize).max(1);
        for h in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *h += 1;
            residual -= 1;
        }
    }
}

/// 计算位于 `(tx, ty)` 的分块的查找表.
fn tile_lut(img: &GrayImage, grid: &Grid, tx: usize, ty: usize, clip: f64) -> Lut {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (x0, y0) = (tx * grid.tile_w, ty * grid.tile_h);
    let (x1, y1) = ((x0 + grid.tile_w).min(width), (y0 + grid.tile_h).min(height));

    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x as u32, y as u32).0[0] as usize] += 1;
        }
    }

    let count = ((x1 - x0) * (y1 - y0)) as u32;
    let area = (grid.tile_w * grid.tile_h) as f64;
    let limit = ((clip * area / BINS as f64) as u32).max(1);
    clip_histogram(&mut hist, limit);

    let scale = 255.0 / count.max(1) as f64;
    let mut lut = [0u8; BINS];
    let mut sum = 0u32;
    for (l, &h) in lut.iter_mut().zip(hist.iter()) {
        sum += h;
        *l = (sum as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// 对像素坐标 `p` 求相邻两个分块索引及第二个分块的权重.
#[inline]
fn neighbours(p: usize, tile: usize, tiles: usize) -> (usize, usize, f64) {
    let f = (p as f64 + 0.5) / tile as f64 - 0.5;
    let lo = f.floor();
    let weight = f - lo;
    let lo = lo as isize;
    let first = lo.max(0) as usize;
    let second = ((lo + 1).max(0) as usize).min(tiles - 1);
    (first.min(tiles - 1), second, weight)
}

/// 对 8-bit 灰度图执行 CLAHE.
///
/// `clip` 为相对裁剪上限 (相对于均匀分布的直方图高度), `tiles` 为每个方向上的分块数.
pub fn clahe(img: &GrayImage, clip: f64, tiles: u32) -> GrayImage {
    let (width, height) = (img.width() as usize, img.height() as usize);
    if width == 0 || height == 0 {
        return img.clone();
    }
    let grid = Grid::new(width, height, tiles as usize);

    let luts: Vec<Vec<Lut>> = (0..grid.tiles_y)
        .map(|ty| {
            (0..grid.tiles_x)
                .map(|tx| tile_lut(img, &grid, tx, ty, clip))
                .collect()
        })
        .collect();

    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, p) in out.enumerate_pixels_mut() {
        let v = img.get_pixel(x, y).0[0] as usize;
        let (tx1, tx2, xa) = neighbours(x as usize, grid.tile_w, grid.tiles_x);
        let (ty1, ty2, ya) = neighbours(y as usize, grid.tile_h, grid.tiles_y);

        let top = luts[ty1][tx1][v] as f64 * (1.0 - xa) + luts[ty1][tx2][v] as f64 * xa;
        let bottom = luts[ty2][tx1][v] as f64 * (1.0 - xa) + luts[ty2][tx2][v] as f64 * xa;
        let value = top * (1.0 - ya) + bottom * ya;
        *p = Luma([value.round().clamp(0.0, 255.0) as u8]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_histogram_preserves_mass() {
        let mut hist = [0u32; BINS];
        hist[0] = 1000;
        hist[10] = 24;
        clip_histogram(&mut hist, 8);
        assert_eq!(hist.iter().sum::<u32>(), 1024);
        assert!(hist[0] < 1000);
    }

    #[test]
    fn test_constant_images() {
        let zero = GrayImage::new(64, 48);
        let out = clahe(&zero, 2.0, 8);
        assert!(out.pixels().all(|p| p.0[0] < 70));

        let white = GrayImage::from_pixel(64, 48, Luma([255]));
        let out = clahe(&white, 2.0, 8);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_small_and_uneven_images() {
        let img = GrayImage::from_fn(13, 5, |x, y| Luma([(x * 19 + y * 7) as u8]));
        let out = clahe(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (13, 5));
        assert_eq!(clahe(&GrayImage::new(0, 0), 2.0, 8).dimensions(), (0, 0));
    }
}
