//! 轮廓导出.
//!
//! 每次导出在目标目录下写入三个文件:
//!
//! 1. `{stem}.bmp`: 与背景同尺寸的黑色 RGB 画布, 以绿色 1 px 闭合折线绘制轮廓;
//! 2. `{stem}-bkg.bmp`: 经窗口映射的 8-bit 背景图;
//! 3. `{stem}.txt`: 形如 `[[x, y], [x, y], ...]` 的点列.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use itertools::Itertools;

use crate::consts::{rgb, BACKGROUND_SUFFIX, EXPORT_ID_LEN};
use crate::contour::{Contour, ContourSet, Point};
use crate::data::window::IntensityWindow;
use crate::error::{ExportError, FileSystemError};
use crate::{ImgWriteVis, OwnedSlice};

mod codec;
pub mod reload;

pub use codec::{new_export_id, ExportStem, Provenance};

/// 一次导出产生的文件.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportRecord {
    /// 文件名公共部分.
    pub stem: ExportStem,
    /// 轮廓图.
    pub contour_path: PathBuf,
    /// 背景图.
    pub background_path: PathBuf,
    /// 点列文本.
    pub points_path: PathBuf,
}

impl ExportRecord {
    fn new(dir: &Path, stem: ExportStem) -> Self {
        let s = stem.encode();
        Self {
            contour_path: dir.join(format!("{s}.bmp")),
            background_path: dir.join(format!("{s}{BACKGROUND_SUFFIX}.bmp")),
            points_path: dir.join(format!("{s}.txt")),
            stem,
        }
    }
}

/// 将点列格式化为 `[[x, y], [x, y], ...]`.
pub fn format_points(points: &[Point]) -> String {
    let body = points.iter().map(|(x, y)| format!("[{x}, {y}]")).join(", ");
    format!("[{body}]")
}

/// 在 `(width, height)` 的黑色画布上绘制闭合轮廓.
pub fn render_contour(contour: &Contour, width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, Rgb(rgb::CANVAS));
    let color = Rgb(rgb::CONTOUR);
    let pts = contour.points();
    for (i, &(x0, y0)) in pts.iter().enumerate() {
        let (x1, y1) = pts[(i + 1) % pts.len()];
        draw_line_segment_mut(
            &mut canvas,
            (x0 as f32, y0 as f32),
            (x1 as f32, y1 as f32),
            color,
        );
    }
    canvas
}

/// 以给定 stem 将轮廓与背景写入 `dir`. 目录不存在时自动创建.
pub fn write_export(
    contour: &Contour,
    background: &OwnedSlice,
    stem: ExportStem,
    dir: &Path,
    window: &IntensityWindow,
) -> Result<ExportRecord, ExportError> {
    fs::create_dir_all(dir).map_err(|e| FileSystemError::new(dir, e))?;
    let record = ExportRecord::new(dir, stem);

    let (h, w) = background.shape();
    render_contour(contour, w as u32, h as u32).save(&record.contour_path)?;
    background.save(&record.background_path, window)?;
    fs::write(&record.points_path, format_points(contour.points()))
        .map_err(|e| FileSystemError::new(&record.points_path, e))?;
    Ok(record)
}

/// 导出集合中排名为 `rank` 的轮廓, 使用新生成的标识.
///
/// 排名不存在时返回 [`ExportError::NoSuchContour`].
pub fn export_contour(
    set: &ContourSet,
    rank: usize,
    background: &OwnedSlice,
    provenance: Provenance,
    dir: &Path,
    window: &IntensityWindow,
) -> Result<ExportRecord, ExportError> {
    let contour = set.get(rank).ok_or(ExportError::NoSuchContour {
        rank,
        len: set.len(),
    })?;
    let stem = ExportStem::generate(provenance, EXPORT_ID_LEN);
    write_export(contour, background, stem, dir, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> ContourSet {
        ContourSet::new(vec![Contour::new(vec![(2, 2), (6, 2), (6, 6), (2, 6)])])
    }

    fn prov() -> Provenance {
        Provenance {
            scale_factor: 4,
            slice_index: 3,
            contour_rank: 0,
            threshold: 70,
        }
    }

    #[test]
    fn test_format_points() {
        assert_eq!(format_points(&[]), "[]");
        assert_eq!(format_points(&[(1, 2), (30, 4)]), "[[1, 2], [30, 4]]");
    }

    #[test]
    fn test_render_contour() {
        let img = render_contour(square().get(0).unwrap(), 10, 8);
        assert_eq!(img.dimensions(), (10, 8));
        assert_eq!(img.get_pixel(4, 2).0, rgb::CONTOUR);
        assert_eq!(img.get_pixel(2, 4).0, rgb::CONTOUR);
        assert_eq!(img.get_pixel(4, 4).0, rgb::CANVAS);
    }

    #[test]
    fn test_export_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let bg = OwnedSlice::filled((8, 10), 40);
        let rec = export_contour(
            &square(),
            0,
            &bg,
            prov(),
            &out,
            &IntensityWindow::clip_8bit(),
        )
        .unwrap();

        assert!(rec.contour_path.is_file());
        assert!(rec.background_path.is_file());
        assert_eq!(
            std::fs::read_to_string(&rec.points_path).unwrap(),
            "[[2, 2], [6, 2], [6, 6], [2, 6]]"
        );
        let bkg = image::open(&rec.background_path).unwrap().into_luma8();
        assert_eq!(bkg.dimensions(), (10, 8));
        assert_eq!(bkg.get_pixel(0, 0).0[0], 40);
        let name = rec.points_path.file_name().unwrap().to_str().unwrap();
        assert_eq!(ExportStem::decode(name), Some(rec.stem.clone()));
    }

    #[test]
    fn test_export_unknown_rank() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_contour(
            &square(),
            1,
            &OwnedSlice::filled((8, 10), 0),
            prov(),
            dir.path(),
            &IntensityWindow::clip_8bit(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ExportError::NoSuchContour { rank: 1, len: 1 }));
    }
}
