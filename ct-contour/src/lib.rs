#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 为医学图像切片序列 (DICOM 体数据或普通位图文件夹) 提供交互式轮廓勾画的核心功能.
//!
//! 该 crate 目前仅提供 `safe` 接口. 界面层 (窗口, 键盘绑定, 鼠标事件) 不在本 crate 范围内,
//! 界面通过 [`Engine`] 的命令方法驱动, 通过 [`Engine::subscribe`] 接收状态变化.
//!
//! # 注意
//!
//! 1. 体数据模式下, 所有切片必须有相同的尺寸, 尺寸不一致的切片会被跳过.
//! 2. 在非期望情况下 (例如直接以越界索引访问切片), 程序会直接 panic, 而不会导致内存错误.
//!   需要可恢复错误时, 使用对应的 `try_*` 接口.
//!
//! # 开发计划
//!
//! ### DICOM 序列读取与排序 ✅
//!
//! 按 `InstanceNumber` 排序, 由相邻切片位置估计层间距.
//!
//! 实现位于 `ct-contour/src/loader`.
//!
//! ### 体数据预处理流水线与磁盘缓存 ✅
//!
//! 重定向, 最近邻放大, 曲率流平滑. 处理结果以 `.npy` 格式缓存,
//! 再次打开同一文件夹时直接读取.
//!
//! 实现位于 `ct-contour/src/volume` 和 `ct-contour/src/cache.rs`.
//!
//! ### 轮廓提取 ✅
//!
//! 高斯模糊, CLAHE, 阈值二值化, 边界跟踪, 按面积降序排列.
//!
//! 实现位于 `ct-contour/src/contour`.
//!
//! ### ROI 与手动修正 ✅
//!
//! ROI 在切片间保持; 用户笔画以指定线宽写入工作栅格.
//! 笔画可选地以参数三次样条平滑显示.
//!
//! 实现位于 `ct-contour/src/roi.rs`, `ct-contour/src/correction.rs` 和 `ct-contour/src/fitting`.
//!
//! ### 轮廓导出与重新读取 ✅
//!
//! 每次导出生成唯一标识, 文件名中记录放大倍数, 切片索引, 轮廓排名和阈值.
//! 导出的点列可以重新组装为三维点云并写出 OBJ 折线.
//!
//! 实现位于 `ct-contour/src/export`.
//!
//! ### 交互引擎 ✅
//!
//! 轮廓提取和导出在后台线程进行, 过期的提取结果按请求编号丢弃.
//!
//! 实现位于 `ct-contour/src/engine`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private
//! API 提供文档.

/// 二维索引 `(h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 体数据与切片基础数据结构.
mod data;

pub use data::{ImgWriteRaw, ImgWriteVis, IntensityWindow, OwnedSlice, SliceView, Volume};

pub mod cache;
pub mod config;
pub mod consts;
pub mod contour;
pub mod correction;
pub mod engine;
pub mod error;
pub mod export;
pub mod fitting;
pub mod loader;
pub mod prelude;
pub mod roi;
pub mod volume;

pub use config::Config;
pub use engine::{Engine, EngineEvent};
pub use error::{EngineError, EngineResult};
