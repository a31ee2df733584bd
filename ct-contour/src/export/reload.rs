//! 读取已导出的轮廓点列, 组装为三维点云并写出 Wavefront OBJ 折线.
//!
//! 导出文件中的 `(x, y)` 被放置到 `(x, 切片索引 × 切片宽度, y)`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::contour::Point;
use crate::error::ReloadError;

use super::ExportStem;

/// 默认切片宽度 (毫米).
pub const DEFAULT_SLICE_WIDTH_MM: f64 = 0.8;

/// 三维点 `(x, y, z)`.
pub type Point3d = (f64, f64, f64);

/// 重新读取的一个导出轮廓.
#[derive(Clone, Debug, PartialEq)]
pub struct ReloadedContour {
    /// 导出文件名公共部分.
    pub stem: ExportStem,
    /// 三维点列.
    pub points: Vec<Point3d>,
}

/// 列出 `dir` 中的全部 `.txt` 导出文件, 按文件名排序.
pub fn contour_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, ReloadError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "txt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// 解析 `[[x, y], [x, y], ...]` 格式的文本.
pub fn parse_points(text: &str) -> Result<Vec<Point>, String> {
    let numbers = text
        .split(|c: char| !(c.is_ascii_digit() || c == '-'))
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i32>().map_err(|e| format!("`{s}`: {e}")))
        .collect::<Result<Vec<i32>, String>>()?;
    if numbers.len() % 2 != 0 {
        return Err(format!("odd number of coordinates ({})", numbers.len()));
    }
    Ok(numbers.chunks_exact(2).map(|c| (c[0], c[1])).collect())
}

/// 读取点列文件.
pub fn read_points<P: AsRef<Path>>(path: P) -> Result<Vec<Point>, ReloadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_points(&text).map_err(|reason| ReloadError::Parse {
        path: path.to_owned(),
        reason,
    })
}

/// 读取一个导出文件, 以文件名中的切片索引和 `slice_width_mm` 计算深度坐标.
pub fn read_export<P: AsRef<Path>>(
    path: P,
    slice_width_mm: f64,
) -> Result<ReloadedContour, ReloadError> {
    let path = path.as_ref();
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(ExportStem::decode)
        .ok_or_else(|| ReloadError::BadStem(path.to_owned()))?;
    let depth = stem.provenance.slice_index as f64 * slice_width_mm;
    let points = read_points(path)?
        .into_iter()
        .map(|(x, y)| (x as f64, depth, y as f64))
        .collect();
    Ok(ReloadedContour { stem, points })
}

/// 将三维点列写成 OBJ 折线对象 (对象名取自文件名).
pub fn write_obj<P: AsRef<Path>>(points: &[Point3d], path: P) -> Result<(), ReloadError> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut out = String::new();
    // 写入 `String` 不会失败.
    let _ = writeln!(out, "o {name}");
    for (x, y, z) in points {
        let _ = writeln!(out, "v {x:.5} {y:.5} {z:.5}");
    }
    if !points.is_empty() {
        out.push('l');
        for i in 1..=points.len() {
            let _ = write!(out, " {i}");
        }
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points() {
        assert_eq!(parse_points("[]").unwrap(), vec![]);
        assert_eq!(
            parse_points("[[1, 2], [30, 4]]").unwrap(),
            vec![(1, 2), (30, 4)]
        );
        assert!(parse_points("[[1, 2], [3]]").is_err());
    }

    #[test]
    fn test_read_export_and_obj() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0a1b2c3d4e-4-5-0-70.txt"), "[[1, 2], [3, 4]]").unwrap();
        std::fs::write(dir.path().join("0a1b2c3d4e-4-5-0-70.bmp"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "[[0, 0]]").unwrap();

        let files = contour_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let c = read_export(&files[0], 0.8).unwrap();
        assert_eq!(c.stem.provenance.slice_index, 5);
        assert_eq!(c.points, vec![(1.0, 4.0, 2.0), (3.0, 4.0, 4.0)]);
        assert!(matches!(
            read_export(&files[1], 0.8),
            Err(ReloadError::BadStem(_))
        ));

        let obj = dir.path().join("c.obj");
        write_obj(&c.points, &obj).unwrap();
        let text = std::fs::read_to_string(&obj).unwrap();
        assert_eq!(
            text,
            "o c\nv 1.00000 4.00000 2.00000\nv 3.00000 4.00000 4.00000\nl 1 2\n"
        );
    }
}
