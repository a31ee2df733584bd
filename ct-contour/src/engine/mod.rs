//! 交互式勾画引擎.
//!
//! [`Engine`] 由主线程独占, 持有全部可变状态; 轮廓提取和导出在后台线程执行.
//! 每个提取请求携带单调递增的 [`Ticket`], 只有与当前编号一致的结果才会被采纳.
//!
//! 界面层通过命令方法驱动引擎, 通过 [`Engine::subscribe`] 接收状态变化通知,
//! 并周期性调用 [`Engine::poll`] 收取后台结果.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use crate::config::Config;
use crate::consts::FLAT_EXPORT_DIR_NAME;
use crate::contour::{adjust_threshold, extract_slice, Contour, ContourSet};
use crate::correction::{self, Annotation};
use crate::error::{EngineError, EngineResult, ExportError};
use crate::export::{ExportRecord, ExportStem, Provenance};
use crate::loader::{is_dicom_folder, FlatFolder};
use crate::roi::{self, Roi, RoiSelector, StickyRoi};
use crate::volume::{VolumeManager, VolumeOrigin};
use crate::OwnedSlice;

mod worker;

pub use worker::{
    ExportJob, ExportOutcome, ExportWorker, ExtractionRequest, ExtractionResult,
    ExtractionWorker, Ticket,
};

/// 状态变化通知.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// 成功打开文件夹.
    FolderOpened {
        /// 文件夹路径.
        folder: PathBuf,
        /// 切片个数.
        slice_count: usize,
    },
    /// 当前切片变化.
    SliceChanged(usize),
    /// 阈值变化.
    ThresholdChanged(u8),
    /// 当前栅格的轮廓计算完成.
    ContoursReady {
        /// 切片索引.
        slice_index: usize,
        /// 轮廓个数.
        count: usize,
    },
    /// 当前选中的轮廓变化.
    ContourSelected(usize),
    /// 用户笔画变化.
    AnnotationChanged,
    /// ROI 变化.
    RoiChanged(Option<Roi>),
    /// 导出完成.
    ExportFinished(ExportRecord),
    /// 导出失败.
    ExportFailed {
        /// 导出文件名公共部分.
        stem: String,
        /// 失败原因.
        reason: String,
    },
}

/// 切片来源.
#[derive(Debug)]
enum Source {
    /// DICOM 体数据.
    Volume(VolumeManager),
    /// 平面图像文件夹.
    Flat(FlatFolder),
}

impl Source {
    fn slice_count(&self) -> usize {
        match self {
            Source::Volume(v) => v.slice_count(),
            Source::Flat(f) => f.len(),
        }
    }

    fn fetch(&self, index: usize) -> EngineResult<OwnedSlice> {
        match self {
            Source::Volume(v) => Ok(v.get_slice(index)?),
            Source::Flat(f) => {
                if index >= f.len() {
                    return Err(crate::error::IndexOutOfRange {
                        index,
                        len: f.len(),
                    }
                    .into());
                }
                Ok(f.load(index)?)
            }
        }
    }

    fn scaling_factor(&self) -> u32 {
        match self {
            Source::Volume(v) => v.scaling_factor(),
            Source::Flat(_) => 1,
        }
    }

    fn output_dir(&self) -> PathBuf {
        match self {
            Source::Volume(v) => v.output_dir().to_owned(),
            Source::Flat(f) => f.folder().join(FLAT_EXPORT_DIR_NAME),
        }
    }
}

/// 一个已打开文件夹的会话状态.
#[derive(Debug)]
struct Session {
    folder: PathBuf,
    source: Source,
    slice_index: usize,
    /// 导航得到的完整切片 (ROI 截取前).
    base: OwnedSlice,
    /// 工作栅格: ROI 截取并叠加手动修正后的图像.
    current: OwnedSlice,
    contours: ContourSet,
    contour_index: usize,
    pending: Option<Ticket>,
}

/// 交互式勾画引擎.
pub struct Engine {
    config: Config,
    target: String,
    session: Option<Session>,
    threshold: u8,
    annotation: Annotation,
    roi: StickyRoi,
    ticket: Ticket,
    extractor: ExtractionWorker,
    exporter: ExportWorker,
    subscribers: Vec<Sender<EngineEvent>>,
}

impl Engine {
    /// 以配置 `config` 创建引擎, 并启动后台工作线程.
    pub fn new(config: Config) -> Self {
        let target = config.target_of("engine");
        let extractor = ExtractionWorker::spawn(config.target_of("extractor"));
        let exporter = ExportWorker::spawn(config.target_of("exporter"));
        Self {
            threshold: config.initial_threshold,
            config,
            target,
            session: None,
            annotation: Annotation::default(),
            roi: StickyRoi::default(),
            ticket: Ticket::default(),
            extractor,
            exporter,
            subscribers: Vec::new(),
        }
    }

    /// 订阅状态变化通知.
    pub fn subscribe(&mut self) -> crossbeam_channel::Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn session(&self) -> EngineResult<&Session> {
        self.session.as_ref().ok_or(EngineError::NoFolder)
    }

    fn ready_session(&self) -> EngineResult<&Session> {
        let s = self.session()?;
        if s.pending.is_some() {
            Err(EngineError::NotReady)
        } else {
            Ok(s)
        }
    }

    /// 为当前工作栅格发起新的提取请求, 并作废之前的请求.
    fn request_extraction(&mut self) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        self.ticket = self.ticket.next();
        s.pending = Some(self.ticket);
        s.contours = ContourSet::default();
        s.contour_index = 0;

        let req = ExtractionRequest {
            ticket: self.ticket,
            raster: s.current.clone(),
            threshold: self.threshold,
            window: self.config.window,
            params: self.config.extract,
        };
        if !self.extractor.submit(req) {
            warn!(target: self.target.as_str(), "extraction worker is gone, extracting inline");
            s.contours = extract_slice(
                &s.current,
                self.threshold,
                &self.config.window,
                &self.config.extract,
            );
            s.pending = None;
            let ev = EngineEvent::ContoursReady {
                slice_index: s.slice_index,
                count: s.contours.len(),
            };
            self.emit(ev);
        }
    }

    fn accept_extraction(&mut self, res: ExtractionResult) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        if s.pending != Some(res.ticket) {
            debug!(target: self.target.as_str(), "discarding stale result for ticket {}", res.ticket.0);
            return;
        }
        s.pending = None;
        s.contours = res.contours;
        s.contour_index = 0;
        let ev = EngineEvent::ContoursReady {
            slice_index: s.slice_index,
            count: s.contours.len(),
        };
        self.emit(ev);
    }

    fn accept_export(&mut self, outcome: &ExportOutcome) {
        let ev = match &outcome.result {
            Ok(rec) => EngineEvent::ExportFinished(rec.clone()),
            Err(e) => EngineEvent::ExportFailed {
                stem: outcome.stem.encode(),
                reason: e.to_string(),
            },
        };
        self.emit(ev);
    }

    /// 收取所有已完成的后台结果, 返回本次收取到的导出结果.
    pub fn poll(&mut self) -> Vec<ExportOutcome> {
        while let Ok(res) = self.extractor.results().try_recv() {
            self.accept_extraction(res);
        }
        let mut outcomes = Vec::new();
        while let Ok(o) = self.exporter.outcomes().try_recv() {
            self.accept_export(&o);
            outcomes.push(o);
        }
        outcomes
    }

    /// 阻塞直到当前栅格的轮廓就绪, 最多等待 `timeout`.
    ///
    /// 超时返回 [`EngineError::NotReady`].
    pub fn wait_ready(&mut self, timeout: Duration) -> EngineResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.session()?.pending.is_none() {
                return Ok(());
            }
            let left = deadline.saturating_duration_since(Instant::now());
            match self.extractor.results().recv_timeout(left) {
                Ok(res) => self.accept_extraction(res),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::NotReady)
                }
            }
        }
    }

    /// 阻塞等待下一个导出结果, 最多等待 `timeout`.
    pub fn wait_export(&mut self, timeout: Duration) -> Option<ExportOutcome> {
        let o = self.exporter.outcomes().recv_timeout(timeout).ok()?;
        self.accept_export(&o);
        Some(o)
    }

    /// 打开文件夹.
    ///
    /// 含有 `*.dcm` 文件时以体数据模式打开, 否则以平面图像模式打开.
    /// 失败时引擎原有状态保持不变.
    pub fn open_folder<P: AsRef<Path>>(&mut self, folder: P) -> EngineResult<()> {
        let folder = folder.as_ref();
        info!(target: self.target.as_str(), "opening folder {}", folder.display());
        let source = if is_dicom_folder(folder) {
            Source::Volume(VolumeManager::open(folder, &self.config)?)
        } else {
            Source::Flat(FlatFolder::open_with_target(
                folder,
                &self.config.target_of("loader"),
            )?)
        };
        self.install(folder, source)
    }

    /// 以已经构建好的体数据开始新的会话, 导出目录与 [`VolumeManager::output_dir`] 一致.
    pub fn open_volume(&mut self, manager: VolumeManager) -> EngineResult<()> {
        let folder = manager.volume().source().to_owned();
        info!(target: self.target.as_str(), "opening volume from {}", folder.display());
        self.install(&folder, Source::Volume(manager))
    }

    /// 以 `source` 替换当前会话. 失败时原有会话保持不变.
    fn install(&mut self, folder: &Path, source: Source) -> EngineResult<()> {
        if source.slice_count() == 0 {
            return Err(EngineError::NoInputData(folder.to_owned()));
        }
        let base = source.fetch(0)?;
        let slice_count = source.slice_count();

        self.session = Some(Session {
            folder: folder.to_owned(),
            source,
            slice_index: 0,
            current: base.clone(),
            base,
            contours: ContourSet::default(),
            contour_index: 0,
            pending: None,
        });
        self.roi.clear();
        self.annotation.clear();
        self.threshold = self.config.initial_threshold;
        self.request_extraction();

        self.emit(EngineEvent::FolderOpened {
            folder: folder.to_owned(),
            slice_count,
        });
        self.emit(EngineEvent::RoiChanged(None));
        self.emit(EngineEvent::ThresholdChanged(self.threshold));
        self.emit(EngineEvent::SliceChanged(0));
        Ok(())
    }

    /// 跳转到与当前切片相距 `delta` 的切片 (首尾循环).
    fn navigate(&mut self, delta: isize) -> EngineResult<()> {
        let s = self.session()?;
        let count = s.source.slice_count() as isize;
        let index = (s.slice_index as isize + delta).rem_euclid(count) as usize;
        let base = s.source.fetch(index)?;

        let current = match self.roi.crop(&base) {
            Ok(c) => c,
            Err(e) => {
                warn!(target: self.target.as_str(), "{e} on slice {index}, clearing ROI");
                self.roi.clear();
                self.emit(EngineEvent::RoiChanged(None));
                base.clone()
            }
        };
        if let Some(s) = self.session.as_mut() {
            s.slice_index = index;
            s.base = base;
            s.current = current;
        }
        self.annotation.clear();
        self.request_extraction();
        debug!(target: self.target.as_str(), "moved to slice {index}");
        self.emit(EngineEvent::SliceChanged(index));
        self.emit(EngineEvent::AnnotationChanged);
        Ok(())
    }

    /// 下一个切片. 最后一个切片的下一个是第一个.
    #[inline]
    pub fn next_slice(&mut self) -> EngineResult<()> {
        self.navigate(1)
    }

    /// 上一个切片. 第一个切片的上一个是最后一个.
    #[inline]
    pub fn previous_slice(&mut self) -> EngineResult<()> {
        self.navigate(-1)
    }

    /// 在轮廓集合中移动 `dir` 步.
    ///
    /// 仅当 `0 <= cur + dir < len - 1` 时移动, 因此最后一个轮廓无法通过导航选中.
    fn step_contour(&mut self, dir: isize) -> EngineResult<()> {
        let s = self.ready_session()?;
        let next = s.contour_index as isize + dir;
        if 0 <= next && next < s.contours.len() as isize - 1 {
            if let Some(s) = self.session.as_mut() {
                s.contour_index = next as usize;
            }
            self.emit(EngineEvent::ContourSelected(next as usize));
        }
        Ok(())
    }

    /// 选择下一个 (面积更小的) 轮廓.
    #[inline]
    pub fn next_contour(&mut self) -> EngineResult<()> {
        self.step_contour(1)
    }

    /// 选择上一个 (面积更大的) 轮廓.
    #[inline]
    pub fn previous_contour(&mut self) -> EngineResult<()> {
        self.step_contour(-1)
    }

    /// 将阈值调整 `delta` (通常为 ±1), 在 `0` 和 `255` 处饱和.
    ///
    /// 已打开文件夹时, 当前工作栅格 (保留手动修正) 会被重新提取.
    pub fn set_threshold_delta(&mut self, delta: i32) {
        let t = adjust_threshold(self.threshold, delta);
        if t == self.threshold {
            return;
        }
        self.threshold = t;
        self.request_extraction();
        self.emit(EngineEvent::ThresholdChanged(t));
    }

    /// 记录一个笔画点.
    pub fn record_point(&mut self, x: i32, y: i32) -> EngineResult<()> {
        self.session()?;
        self.annotation.record_point(x, y);
        self.emit(EngineEvent::AnnotationChanged);
        Ok(())
    }

    /// 清空笔画.
    pub fn clear_points(&mut self) {
        if !self.annotation.is_empty() {
            self.annotation.clear();
            self.emit(EngineEvent::AnnotationChanged);
        }
    }

    /// 切换笔画的平滑显示, 返回切换后的状态.
    pub fn toggle_stroke_smoothing(&mut self) -> bool {
        let on = self.annotation.toggle_smoothing();
        self.emit(EngineEvent::AnnotationChanged);
        on
    }

    /// 将笔画写入工作栅格, 清空笔画并重新提取轮廓.
    pub fn apply_correction(&mut self) -> EngineResult<()> {
        let s = self.ready_session()?;
        let corrected =
            correction::apply_correction(&s.current, self.annotation.points(), &self.config.correction);
        if let Some(s) = self.session.as_mut() {
            s.current = corrected;
        }
        self.annotation.clear();
        self.request_extraction();
        self.emit(EngineEvent::AnnotationChanged);
        Ok(())
    }

    /// 通过 `selector` 交互式选择 ROI. 零面积选择被忽略.
    pub fn activate_roi(&mut self, selector: &mut dyn RoiSelector) -> EngineResult<()> {
        let s = self.session()?;
        let roi = selector.select(&s.base, s.slice_index);
        if roi.is_empty() {
            debug!(target: self.target.as_str(), "ignoring empty ROI selection {roi:?}");
            return Ok(());
        }
        let cropped = roi::apply(&s.base, roi)?;
        self.roi.set(roi);
        if let Some(s) = self.session.as_mut() {
            s.current = cropped;
        }
        self.annotation.clear();
        self.request_extraction();
        self.emit(EngineEvent::RoiChanged(Some(roi)));
        self.emit(EngineEvent::AnnotationChanged);
        Ok(())
    }

    /// 清除 ROI, 工作栅格恢复为完整切片.
    pub fn clear_roi(&mut self) {
        if !self.roi.is_active() {
            return;
        }
        self.roi.clear();
        if let Some(s) = self.session.as_mut() {
            s.current = s.base.clone();
            self.annotation.clear();
            self.request_extraction();
        }
        self.emit(EngineEvent::RoiChanged(None));
    }

    /// 在后台导出当前选中的轮廓, 返回本次导出的文件名公共部分.
    ///
    /// 导出结果通过 [`Engine::poll`] 或 [`Engine::wait_export`] 收取.
    pub fn export_current_contour(&mut self) -> EngineResult<ExportStem> {
        let s = self.ready_session()?;
        let contour = s
            .contours
            .get(s.contour_index)
            .ok_or(ExportError::NoSuchContour {
                rank: s.contour_index,
                len: s.contours.len(),
            })?
            .clone();
        let provenance = Provenance {
            scale_factor: s.source.scaling_factor(),
            slice_index: s.slice_index,
            contour_rank: s.contour_index,
            threshold: self.threshold,
        };
        let stem = ExportStem::generate(provenance, self.config.export_id_len);
        let job = ExportJob {
            contour,
            background: s.current.clone(),
            stem: stem.clone(),
            dir: s.source.output_dir(),
            window: self.config.window,
        };
        info!(target: self.target.as_str(), "exporting {}", stem.encode());
        if !self.exporter.submit(job) {
            warn!(target: self.target.as_str(), "export worker is gone");
        }
        Ok(stem)
    }

    /// 当前配置.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 当前打开的文件夹.
    #[inline]
    pub fn folder(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.folder.as_path())
    }

    /// 当前切片索引.
    #[inline]
    pub fn slice_index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.slice_index)
    }

    /// 切片个数. 未打开文件夹时为 0.
    #[inline]
    pub fn slice_count(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.source.slice_count())
            .unwrap_or(0)
    }

    /// 当前阈值.
    #[inline]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// 当前选中轮廓的排名.
    #[inline]
    pub fn current_contour_index(&self) -> usize {
        self.session.as_ref().map(|s| s.contour_index).unwrap_or(0)
    }

    /// 当前选中的轮廓. 未就绪或集合为空时为 `None`.
    pub fn current_contour(&self) -> Option<&Contour> {
        let s = self.session.as_ref()?;
        s.contours.get(s.contour_index)
    }

    /// 当前工作栅格的轮廓集合. 未就绪时为空集合.
    #[inline]
    pub fn contours(&self) -> Option<&ContourSet> {
        self.session.as_ref().map(|s| &s.contours)
    }

    /// 当前工作栅格的轮廓是否已就绪.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.pending.is_none())
            .unwrap_or(false)
    }

    /// 当前工作栅格.
    #[inline]
    pub fn current_image(&self) -> Option<&OwnedSlice> {
        self.session.as_ref().map(|s| &s.current)
    }

    /// 当前笔画.
    #[inline]
    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    /// 当前 ROI.
    #[inline]
    pub fn roi(&self) -> Option<Roi> {
        self.roi.get()
    }

    /// 导出目录.
    #[inline]
    pub fn output_dir(&self) -> Option<PathBuf> {
        self.session.as_ref().map(|s| s.source.output_dir())
    }

    /// 当前切片的放大倍数.
    #[inline]
    pub fn scaling_factor(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.source.scaling_factor())
    }

    /// 体数据来源. 平面图像模式或未打开文件夹时为 `None`.
    pub fn origin(&self) -> Option<VolumeOrigin> {
        match &self.session.as_ref()?.source {
            Source::Volume(v) => Some(v.origin()),
            Source::Flat(_) => None,
        }
    }
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests;
