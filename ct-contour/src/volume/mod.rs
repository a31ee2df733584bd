//! 体数据管理: 加载、预处理、缓存和按索引取切片.

use std::path::{Path, PathBuf};

use log::{info, warn};
use ndarray::{Array2, Array3, Axis};

use crate::cache::VolumeCache;
use crate::config::Config;
use crate::error::{EngineError, IndexOutOfRange};
use crate::loader::{self, RawSlice};
use crate::{OwnedSlice, SliceView, Volume};

pub mod resample;
pub mod smooth;

pub use resample::{reorient, resize_nearest};
pub use smooth::curvature_flow;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 体数据的来源.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VolumeOrigin {
    /// 直接读取了持久化缓存, 跳过了预处理流程.
    Cache,
    /// 由原始切片经完整预处理流程得到.
    Pipeline,
}

/// 将同形状的原始切片按顺序堆叠为 `(z, h, w)` 体数据.
///
/// 调用方保证 `slices` 非空且形状一致.
fn stack(slices: &[RawSlice]) -> Array3<u16> {
    let (h, w) = slices[0].shape();
    Array3::from_shape_fn((slices.len(), h, w), |(z, r, c)| slices[z].pixels[(r, c)])
}

/// 对单个切片执行放大和平滑.
fn process_slice(sli: Array2<u16>, config: &Config) -> Array2<u16> {
    let resized = resize_nearest(sli.view(), config.scaling_factor);
    curvature_flow(resized.view(), &config.smoothing)
}

/// 并行处理所有切片.
#[cfg(feature = "rayon")]
fn map_slices(inputs: Vec<Array2<u16>>, config: &Config) -> Vec<Array2<u16>> {
    inputs
        .into_par_iter()
        .map(|s| process_slice(s, config))
        .collect()
}

/// 依次处理所有切片.
#[cfg(not(feature = "rayon"))]
fn map_slices(inputs: Vec<Array2<u16>>, config: &Config) -> Vec<Array2<u16>> {
    inputs
        .into_iter()
        .map(|s| process_slice(s, config))
        .collect()
}

/// 逐切片放大并平滑. 启用 `rayon` feature 时并行执行.
fn process_slices(data: Array3<u16>, config: &Config) -> Array3<u16> {
    let (z, h, w) = data.dim();
    let inputs: Vec<Array2<u16>> = data.axis_iter(Axis(0)).map(|v| v.to_owned()).collect();
    let outputs = map_slices(inputs, config);

    let f = config.scaling_factor.max(1) as usize;
    let mut out = Array3::zeros((z, h * f, w * f));
    for (mut dst, src) in out.axis_iter_mut(Axis(0)).zip(outputs.iter()) {
        dst.assign(src);
    }
    out
}

/// 完整预处理流程: 堆叠, 重定向, 放大, 平滑.
pub fn run_pipeline(slices: &[RawSlice], config: &Config) -> Array3<u16> {
    let stacked = stack(slices);
    let reoriented = reorient(stacked.view());
    process_slices(reoriented, config)
}

/// 体数据管理器. 打开后内容不可变.
#[derive(Debug, Clone)]
pub struct VolumeManager {
    volume: Volume,
    origin: VolumeOrigin,
    output_dir: PathBuf,
}

impl VolumeManager {
    /// 打开 DICOM 文件夹 `folder`.
    ///
    /// 缓存命中时直接使用缓存 (此时切片间距未知); 否则执行完整预处理流程并写入缓存.
    /// 写入缓存失败只记录警告, 不影响返回值.
    pub fn open<P: AsRef<Path>>(folder: P, config: &Config) -> Result<Self, EngineError> {
        let folder = folder.as_ref();
        let target = config.target_of("volume");
        let cache = VolumeCache::with_target(folder, &config.target_of("cache"));
        info!(target: target.as_str(), "opening {}", folder.display());

        if let Some(data) = cache.try_load() {
            info!(target: target.as_str(), "restored {} slices from cache", data.dim().0);
            return Ok(Self {
                volume: Volume::new(data, None, config.scaling_factor, folder),
                origin: VolumeOrigin::Cache,
                output_dir: cache.dir().to_owned(),
            });
        }

        let slices = loader::load_with_target(folder, &config.target_of("loader"))?;
        Ok(Self::from_raw_slices(folder, &slices, config))
    }

    /// 由已加载的原始切片执行预处理流程, 并写入 `folder` 下的缓存.
    ///
    /// `slices` 必须非空且形状一致 (即 [`loader::load`] 的成功返回值).
    pub fn from_raw_slices<P: AsRef<Path>>(
        folder: P,
        slices: &[RawSlice],
        config: &Config,
    ) -> Self {
        let folder = folder.as_ref();
        let target = config.target_of("volume");
        let cache = VolumeCache::with_target(folder, &config.target_of("cache"));

        let data = run_pipeline(slices, config);
        info!(target: target.as_str(), "processed volume of shape {:?}", data.dim());
        if let Err(e) = cache.store(&data) {
            warn!(target: target.as_str(), "could not store cache: {e}");
        }
        let spacing = slices.first().and_then(|s| s.spacing);
        Self {
            volume: Volume::new(data, spacing, config.scaling_factor, folder),
            origin: VolumeOrigin::Pipeline,
            output_dir: cache.dir().to_owned(),
        }
    }

    /// 获取第 `index` 个切片的副本.
    #[inline]
    pub fn get_slice(&self, index: usize) -> Result<OwnedSlice, IndexOutOfRange> {
        self.slice_view(index).map(|s| s.to_owned_slice())
    }

    /// 获取第 `index` 个切片的借用视图.
    #[inline]
    pub fn slice_view(&self, index: usize) -> Result<SliceView<'_>, IndexOutOfRange> {
        self.volume.try_slice_at(index)
    }

    /// 切片个数.
    #[inline]
    pub fn slice_count(&self) -> usize {
        self.volume.slice_count()
    }

    /// 放大倍数.
    #[inline]
    pub fn scaling_factor(&self) -> u32 {
        self.volume.scaling_factor()
    }

    /// 切片间距 (毫米). 从缓存恢复时为 `None`.
    #[inline]
    pub fn spacing(&self) -> Option<f64> {
        self.volume.spacing()
    }

    /// 导出 (及缓存) 目录.
    #[inline]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 体数据来源.
    #[inline]
    pub fn origin(&self) -> VolumeOrigin {
        self.origin
    }

    /// 底层体数据.
    #[inline]
    pub fn volume(&self) -> &Volume {
        &self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmoothParams;
    use std::path::PathBuf;

    fn raw(n: i32, fill: u16) -> RawSlice {
        RawSlice {
            path: PathBuf::new(),
            instance_number: n,
            position_z: Some(n as f64 * 2.5),
            slice_location: None,
            spacing: Some(2.5),
            pixels: Array2::from_shape_fn((3, 2), |(r, c)| fill + (r * 2 + c) as u16),
        }
    }

    fn quick_config() -> Config {
        Config {
            scaling_factor: 2,
            smoothing: SmoothParams {
                iterations: 0,
                time_step: 0.05,
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_pipeline_shape_and_order() {
        let slices = [raw(1, 0), raw(2, 100)];
        let data = run_pipeline(&slices, &quick_config());
        // (z, w * f, h * f)
        assert_eq!(data.dim(), (2, 4, 6));
        // 切片顺序反转, 且每个切片被转置.
        assert_eq!(data[(0, 0, 0)], 100);
        assert_eq!(data[(1, 2, 0)], 1);
        assert_eq!(data[(1, 0, 2)], 2);
    }

    #[test]
    fn test_from_raw_slices_then_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick_config();
        let slices = [raw(1, 0), raw(2, 100), raw(3, 200)];

        let first = VolumeManager::from_raw_slices(dir.path(), &slices, &config);
        assert_eq!(first.origin(), VolumeOrigin::Pipeline);
        assert_eq!(first.slice_count(), 3);
        assert_eq!(first.spacing(), Some(2.5));

        let second = VolumeManager::open(dir.path(), &config).unwrap();
        assert_eq!(second.origin(), VolumeOrigin::Cache);
        assert_eq!(second.spacing(), None);
        assert_eq!(second.volume().data(), first.volume().data());
        assert_eq!(second.output_dir(), dir.path().join("saved_dicom_imgs"));

        let err = second.get_slice(3).err().unwrap();
        assert_eq!((err.index, err.len), (3, 3));
        assert_eq!(second.get_slice(2).unwrap().shape(), (4, 6));
    }
}
