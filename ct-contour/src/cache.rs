//! 体数据持久化缓存.
//!
//! 处理完毕的体数据以 npy 格式保存在 `<源文件夹>/saved_dicom_imgs/output.npy`.
//! 缓存没有失效机制: 源文件夹内容变化后, 旧缓存仍会被原样读取.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use ndarray::Array3;
use ndarray_npy::{ReadNpyError, ReadNpyExt, WriteNpyExt};

use crate::config::DEFAULT_LOG_TARGET;
use crate::consts::{CACHE_DIR_NAME, CACHE_FILE_NAME};
use crate::error::FileSystemError;

/// 某个源文件夹对应的体数据缓存.
#[derive(Debug, Clone)]
pub struct VolumeCache {
    dir: PathBuf,
    target: String,
}

impl VolumeCache {
    /// 以默认日志 target 初始化.
    #[inline]
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        Self::with_target(folder, &format!("{DEFAULT_LOG_TARGET}::cache"))
    }

    /// 初始化. 该操作不访问文件系统.
    pub fn with_target<P: AsRef<Path>>(folder: P, target: &str) -> Self {
        Self {
            dir: folder.as_ref().join(CACHE_DIR_NAME),
            target: target.to_owned(),
        }
    }

    /// 缓存目录.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 缓存文件路径.
    #[inline]
    pub fn file(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }

    /// 尝试读取缓存. 文件不存在或无法解析时均视为未命中.
    pub fn try_load(&self) -> Option<Array3<u16>> {
        let path = self.file();
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                debug!(target: self.target.as_str(), "cache miss at {}: {e}", path.display());
                return None;
            }
        };
        match Array3::<u16>::read_npy(file) {
            Ok(data) => {
                debug!(target: self.target.as_str(), "cache hit at {}, shape {:?}", path.display(), data.dim());
                Some(data)
            }
            Err(e) => {
                self.warn_corrupt(&path, &e);
                None
            }
        }
    }

    fn warn_corrupt(&self, path: &Path, e: &ReadNpyError) {
        warn!(target: self.target.as_str(), "ignoring unreadable cache {}: {e}", path.display());
    }

    /// 写入缓存, 必要时创建缓存目录.
    pub fn store(&self, data: &Array3<u16>) -> Result<(), FileSystemError> {
        fs::create_dir_all(&self.dir).map_err(|e| FileSystemError::new(&self.dir, e))?;
        let path = self.file();
        let file = File::create(&path).map_err(|e| FileSystemError::new(&path, e))?;
        let mut writer = BufWriter::new(file);
        data.write_npy(&mut writer)
            .map_err(|e| FileSystemError::new(&path, io::Error::other(e)))?;
        writer.flush().map_err(|e| FileSystemError::new(&path, e))?;
        debug!(target: self.target.as_str(), "stored cache at {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::VolumeCache;
    use ndarray::Array3;

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VolumeCache::new(dir.path());
        assert!(cache.try_load().is_none());

        let data = Array3::from_shape_fn((2, 3, 4), |(z, h, w)| (z * 100 + h * 10 + w) as u16);
        cache.store(&data).unwrap();
        assert!(cache.dir().is_dir());
        assert_eq!(cache.try_load().unwrap(), data);
    }

    #[test]
    fn test_corrupt_cache_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VolumeCache::new(dir.path());
        std::fs::create_dir_all(cache.dir()).unwrap();
        std::fs::write(cache.file(), b"garbage").unwrap();
        assert!(cache.try_load().is_none());
    }
}
