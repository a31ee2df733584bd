//! 引擎和各组件的可调参数.

use crate::consts::{DEFAULT_SCALING_FACTOR, DEFAULT_THRESHOLD, EXPORT_ID_LEN};
use crate::data::window::IntensityWindow;

/// 默认日志 target 前缀.
pub const DEFAULT_LOG_TARGET: &str = "ct_contour";

/// 曲率流平滑参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SmoothParams {
    /// 迭代次数.
    pub iterations: u32,
    /// 每次迭代的时间步长.
    pub time_step: f64,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            iterations: 20,
            time_step: 0.05,
        }
    }
}

/// 轮廓提取参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractParams {
    /// 高斯模糊的标准差.
    pub blur_sigma: f32,
    /// CLAHE 裁剪上限.
    pub clahe_clip: f64,
    /// CLAHE 在每个方向上的分块数.
    pub clahe_tiles: u32,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            clahe_clip: 2.0,
            clahe_tiles: 8,
        }
    }
}

/// 手动修正的笔画参数.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorrectionParams {
    /// 笔画宽度 (像素).
    pub stroke_width: u32,
    /// 笔画写入的强度值.
    pub value: u16,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            stroke_width: 2,
            value: u16::MAX,
        }
    }
}

/// 全局配置.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// 体数据切片的放大倍数.
    pub scaling_factor: u32,
    /// 平滑参数.
    pub smoothing: SmoothParams,
    /// 轮廓提取参数.
    pub extract: ExtractParams,
    /// 打开文件夹后的初始阈值.
    pub initial_threshold: u8,
    /// 手动修正参数.
    pub correction: CorrectionParams,
    /// 16-bit 强度到 8-bit 灰度的映射窗口.
    pub window: IntensityWindow,
    /// 导出标识符的十六进制字符数.
    pub export_id_len: usize,
    /// 日志 target 前缀. 各组件以 `"{log_target}::{组件名}"` 记录日志.
    pub log_target: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scaling_factor: DEFAULT_SCALING_FACTOR,
            smoothing: SmoothParams::default(),
            extract: ExtractParams::default(),
            initial_threshold: DEFAULT_THRESHOLD,
            correction: CorrectionParams::default(),
            window: IntensityWindow::clip_8bit(),
            export_id_len: EXPORT_ID_LEN,
            log_target: DEFAULT_LOG_TARGET.to_owned(),
        }
    }
}

impl Config {
    /// 组件 `component` 的日志 target.
    #[inline]
    pub fn target_of(&self, component: &str) -> String {
        format!("{}::{component}", self.log_target)
    }
}
