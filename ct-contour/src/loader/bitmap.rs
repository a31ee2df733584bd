//! 平面图像模式: 文件夹中的每个位图就是一个独立切片.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::DEFAULT_LOG_TARGET;
use crate::consts::BITMAP_EXTENSIONS;
use crate::error::LoadError;
use crate::OwnedSlice;

use super::{has_extension, sorted_entries};

/// 按文件名排序的图像文件夹. 只保留能被解码的图像; 切片在访问时重新读取.
#[derive(Debug, Clone)]
pub struct FlatFolder {
    folder: PathBuf,
    files: Vec<PathBuf>,
}

/// 完整解码位图 `path`.
fn decode(path: &Path) -> Result<OwnedSlice, LoadError> {
    let img = image::open(path).map_err(|e| LoadError::InvalidSlice {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(OwnedSlice::from_gray8(&img.into_luma8()))
}

impl FlatFolder {
    /// 以默认日志 target 打开文件夹 `folder`.
    #[inline]
    pub fn open<P: AsRef<Path>>(folder: P) -> Result<Self, LoadError> {
        Self::open_with_target(folder, &format!("{DEFAULT_LOG_TARGET}::loader"))
    }

    /// 枚举文件夹 `folder` 中的全部图像文件 (子目录被跳过), 并逐个试解码.
    ///
    /// 1. 无法解码的文件被跳过并记录警告, 不计入切片个数.
    /// 2. 没有任何合法图像时返回 [`LoadError::NoInputData`].
    pub fn open_with_target<P: AsRef<Path>>(folder: P, target: &str) -> Result<Self, LoadError> {
        let folder = folder.as_ref().to_owned();
        info!(target: target, "scanning images in {}", folder.display());

        let mut files = Vec::new();
        let mut invalid = 0usize;
        let candidates = sorted_entries(&folder)?
            .into_iter()
            .filter(|p| p.is_file() && has_extension(p, &BITMAP_EXTENSIONS));
        for path in candidates {
            match decode(&path) {
                Ok(_) => files.push(path),
                Err(e) => {
                    warn!(target: target, "could not load {}: {e}", path.display());
                    invalid += 1;
                }
            }
        }

        if files.is_empty() {
            return Err(LoadError::NoInputData(folder));
        }
        info!(target: target, "found {} images ({} skipped)", files.len(), invalid);
        Ok(Self { folder, files })
    }

    /// 源文件夹.
    #[inline]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// 图像个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// 是否为空. 成功打开的实例永远非空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 第 `index` 个图像的路径. 越界时返回 `None`.
    #[inline]
    pub fn path(&self, index: usize) -> Option<&Path> {
        self.files.get(index).map(PathBuf::as_path)
    }

    /// 读取第 `index` 个图像, 按 8-bit 灰度读取后扩展为 16-bit 切片.
    ///
    /// 当 `index` 越界时 panic.
    pub fn load(&self, index: usize) -> Result<OwnedSlice, LoadError> {
        decode(&self.files[index])
    }
}
