//! 切片加载器.
//!
//! 提供迭代器风格的文件夹读取模式: 每个文件对应一个 `(路径, 结果)` 项,
//! 单个文件的失败不会中断迭代.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::Array2;

use crate::config::DEFAULT_LOG_TARGET;
use crate::consts::DICOM_EXTENSION;
use crate::error::LoadError;
use crate::Idx2d;

pub mod bitmap;
mod dicom;

pub use bitmap::FlatFolder;
pub use dicom::read_slice;

/// 从单个 DICOM 文件中解析出的原始切片.
#[derive(Debug, Clone)]
pub struct RawSlice {
    /// 来源文件.
    pub path: PathBuf,
    /// `InstanceNumber` 属性, 决定切片顺序.
    pub instance_number: i32,
    /// `ImagePositionPatient` 的第三个分量.
    pub position_z: Option<f64>,
    /// `SliceLocation` 属性.
    pub slice_location: Option<f64>,
    /// 相邻切片间距 (毫米). 由 [`load`] 统一写入每个切片.
    pub spacing: Option<f64>,
    /// 像素矩阵, 形状为 (行, 列).
    pub pixels: Array2<u16>,
}

impl RawSlice {
    /// 像素矩阵形状 (行, 列).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.pixels.dim()
    }
}

/// 列出文件夹 `folder` 的所有条目, 按文件名排序.
pub(crate) fn sorted_entries(folder: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut entries = fs::read_dir(folder)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

/// 判断路径扩展名 (忽略大小写) 是否在 `exts` 中.
pub(crate) fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// 文件夹中是否至少含有一个 `*.dcm` 文件.
///
/// 文件夹无法读取时返回 `false`.
pub fn is_dicom_folder<P: AsRef<Path>>(folder: P) -> bool {
    match fs::read_dir(folder.as_ref()) {
        Ok(rd) => rd
            .filter_map(Result::ok)
            .map(|e| e.path())
            .any(|p| p.is_file() && has_extension(&p, &[DICOM_EXTENSION])),
        Err(_) => false,
    }
}

/// 文件夹中所有文件的 DICOM 切片加载器. 子目录会被跳过.
#[derive(Debug)]
pub struct SliceFiles {
    files_rev: Vec<PathBuf>,
    target: String,
}

impl SliceFiles {
    /// 枚举文件夹 `folder`. 文件夹本身无法读取时返回错误.
    pub fn open<P: AsRef<Path>>(folder: P, target: &str) -> Result<Self, LoadError> {
        let mut files_rev = Vec::new();
        for p in sorted_entries(folder.as_ref())? {
            if p.is_dir() {
                debug!(target: target, "skipping directory {}", p.display());
            } else {
                files_rev.push(p);
            }
        }
        files_rev.reverse();
        Ok(Self {
            files_rev,
            target: target.to_owned(),
        })
    }
}

impl Iterator for SliceFiles {
    type Item = (PathBuf, Result<RawSlice, LoadError>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.files_rev.pop()?;
        let data = read_slice(&path);
        if let Err(e) = &data {
            warn!(target: self.target.as_str(), "could not load {}: {e}", path.display());
        }
        Some((path, data))
    }
}

impl ExactSizeIterator for SliceFiles {
    #[inline]
    fn len(&self) -> usize {
        self.files_rev.len()
    }
}

/// 由前两个切片估计切片间距.
///
/// 优先使用 `ImagePositionPatient` 的 z 分量之差, 否则使用 `SliceLocation` 之差.
fn estimate_spacing(slices: &[RawSlice]) -> Option<f64> {
    let [a, b, ..] = slices else {
        return None;
    };
    match (a.position_z, b.position_z) {
        (Some(p0), Some(p1)) => Some((p0 - p1).abs()),
        _ => match (a.slice_location, b.slice_location) {
            (Some(l0), Some(l1)) => Some((l0 - l1).abs()),
            _ => None,
        },
    }
}

/// 以默认日志 target 加载文件夹中的全部 DICOM 切片.
#[inline]
pub fn load<P: AsRef<Path>>(folder: P) -> Result<Vec<RawSlice>, LoadError> {
    load_with_target(folder, &format!("{DEFAULT_LOG_TARGET}::loader"))
}

/// 加载文件夹中的全部 DICOM 切片, 并按 `InstanceNumber` 升序 (稳定) 排列.
///
/// 1. 无法解析的文件被跳过并记录警告.
/// 2. 像素形状与第一个合法切片不同的文件无法堆叠, 同样被跳过.
/// 3. 没有任何合法切片时返回 [`LoadError::NoInputData`].
pub fn load_with_target<P: AsRef<Path>>(
    folder: P,
    target: &str,
) -> Result<Vec<RawSlice>, LoadError> {
    let folder = folder.as_ref();
    info!(target: target, "loading slices from {}", folder.display());

    let mut slices: Vec<RawSlice> = Vec::new();
    let mut invalid = 0usize;
    for (path, data) in SliceFiles::open(folder, target)? {
        let Ok(s) = data else {
            invalid += 1;
            continue;
        };
        match slices.first() {
            Some(first) if first.shape() != s.shape() => {
                warn!(
                    target: target,
                    "skipping {}: shape {:?} differs from {:?}",
                    path.display(),
                    s.shape(),
                    first.shape()
                );
                invalid += 1;
            }
            _ => slices.push(s),
        }
    }

    if slices.is_empty() {
        return Err(LoadError::NoInputData(folder.to_owned()));
    }

    slices.sort_by_key(|s| s.instance_number);
    let spacing = estimate_spacing(&slices);
    for s in slices.iter_mut() {
        s.spacing = spacing;
    }
    info!(
        target: target,
        "loaded {} slices ({} skipped), spacing {:?}",
        slices.len(),
        invalid,
        spacing
    );
    Ok(slices)
}
