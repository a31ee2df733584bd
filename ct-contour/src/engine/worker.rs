//! 后台工作线程.
//!
//! 工作线程持有各自输入的私有副本, 通过通道与引擎通信, 从不接触引擎状态.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};

use crate::config::ExtractParams;
use crate::contour::{extract_slice, Contour, ContourSet};
use crate::data::window::IntensityWindow;
use crate::error::ExportError;
use crate::export::{write_export, ExportRecord, ExportStem};
use crate::OwnedSlice;

/// 请求编号. 单调递增, 用于丢弃过期结果.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ticket(pub u64);

impl Ticket {
    /// 下一个编号.
    #[inline]
    pub fn next(self) -> Self {
        Ticket(self.0 + 1)
    }
}

/// 轮廓提取请求.
#[derive(Clone, Debug)]
pub struct ExtractionRequest {
    /// 请求编号.
    pub ticket: Ticket,
    /// 工作栅格的私有副本.
    pub raster: OwnedSlice,
    /// 阈值.
    pub threshold: u8,
    /// 强度窗口.
    pub window: IntensityWindow,
    /// 提取参数.
    pub params: ExtractParams,
}

/// 轮廓提取结果.
#[derive(Clone, Debug)]
pub struct ExtractionResult {
    /// 对应请求的编号.
    pub ticket: Ticket,
    /// 提取到的轮廓.
    pub contours: ContourSet,
}

/// 单线程轮廓提取器.
///
/// 开始工作前会清空请求队列, 只处理其中最新的请求.
pub struct ExtractionWorker {
    requests: Option<Sender<ExtractionRequest>>,
    results: Receiver<ExtractionResult>,
    handle: Option<JoinHandle<()>>,
}

impl ExtractionWorker {
    /// 启动工作线程. `target` 为日志 target.
    pub fn spawn(target: String) -> Self {
        let (req_tx, req_rx) = unbounded::<ExtractionRequest>();
        let (res_tx, res_rx) = unbounded::<ExtractionResult>();
        let handle = thread::spawn(move || {
            while let Ok(mut req) = req_rx.recv() {
                let mut skipped = 0usize;
                while let Ok(newer) = req_rx.try_recv() {
                    req = newer;
                    skipped += 1;
                }
                if skipped > 0 {
                    debug!(target: target.as_str(), "superseded {skipped} pending requests");
                }
                let contours =
                    extract_slice(&req.raster, req.threshold, &req.window, &req.params);
                debug!(
                    target: target.as_str(),
                    "ticket {} produced {} contours",
                    req.ticket.0,
                    contours.len()
                );
                let res = ExtractionResult {
                    ticket: req.ticket,
                    contours,
                };
                if res_tx.send(res).is_err() {
                    break;
                }
            }
        });
        Self {
            requests: Some(req_tx),
            results: res_rx,
            handle: Some(handle),
        }
    }

    /// 提交请求. 工作线程已退出时返回 `false`.
    pub fn submit(&self, req: ExtractionRequest) -> bool {
        self.requests
            .as_ref()
            .map(|tx| tx.send(req).is_ok())
            .unwrap_or(false)
    }

    /// 结果通道.
    #[inline]
    pub fn results(&self) -> &Receiver<ExtractionResult> {
        &self.results
    }
}

impl Drop for ExtractionWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// 导出任务.
#[derive(Clone, Debug)]
pub struct ExportJob {
    /// 被导出的轮廓.
    pub contour: Contour,
    /// 背景栅格.
    pub background: OwnedSlice,
    /// 文件名公共部分.
    pub stem: ExportStem,
    /// 目标目录.
    pub dir: PathBuf,
    /// 背景图窗口.
    pub window: IntensityWindow,
}

/// 导出任务的完成通知.
#[derive(Debug)]
pub struct ExportOutcome {
    /// 任务的文件名公共部分.
    pub stem: ExportStem,
    /// 结果.
    pub result: Result<ExportRecord, ExportError>,
}

/// 单线程导出器. 按提交顺序依次处理任务.
pub struct ExportWorker {
    jobs: Option<Sender<ExportJob>>,
    outcomes: Receiver<ExportOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl ExportWorker {
    /// 启动工作线程. `target` 为日志 target.
    pub fn spawn(target: String) -> Self {
        let (job_tx, job_rx) = unbounded::<ExportJob>();
        let (out_tx, out_rx) = unbounded::<ExportOutcome>();
        let handle = thread::spawn(move || {
            for job in job_rx {
                let stem = job.stem.clone();
                let result =
                    write_export(&job.contour, &job.background, job.stem, &job.dir, &job.window);
                match &result {
                    Ok(rec) => debug!(target: target.as_str(), "exported {}", rec.points_path.display()),
                    Err(e) => warn!(target: target.as_str(), "export {} failed: {e}", stem.encode()),
                }
                if out_tx.send(ExportOutcome { stem, result }).is_err() {
                    break;
                }
            }
        });
        Self {
            jobs: Some(job_tx),
            outcomes: out_rx,
            handle: Some(handle),
        }
    }

    /// 提交任务. 工作线程已退出时返回 `false`.
    pub fn submit(&self, job: ExportJob) -> bool {
        self.jobs
            .as_ref()
            .map(|tx| tx.send(job).is_ok())
            .unwrap_or(false)
    }

    /// 完成通知通道.
    #[inline]
    pub fn outcomes(&self) -> &Receiver<ExportOutcome> {
        &self.outcomes
    }
}

impl Drop for ExportWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(ticket: u64, value: u16) -> ExtractionRequest {
        let raster = OwnedSlice::new(ndarray::Array2::from_shape_fn((32, 32), |(r, c)| {
            if (8..24).contains(&r) && (8..24).contains(&c) {
                value
            } else {
                0
            }
        }));
        ExtractionRequest {
            ticket: Ticket(ticket),
            raster,
            threshold: 70,
            window: IntensityWindow::clip_8bit(),
            params: ExtractParams::default(),
        }
    }

    #[test]
    fn test_extraction_round_trip() {
        let w = ExtractionWorker::spawn("test".to_owned());
        assert!(w.submit(request(1, 250)));
        let res = w.results().recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(res.ticket, Ticket(1));
        assert!(!res.contours.is_empty());
    }

    #[test]
    fn test_latest_request_is_always_served() {
        let w = ExtractionWorker::spawn("test".to_owned());
        for t in 1..=5 {
            assert!(w.submit(request(t, 250)));
        }
        // 中间的请求可能被跳过, 但最后一个一定有结果.
        loop {
            let res = w.results().recv_timeout(Duration::from_secs(10)).unwrap();
            if res.ticket == Ticket(5) {
                break;
            }
            assert!(res.ticket < Ticket(5));
        }
    }

    #[test]
    fn test_ticket_next() {
        assert_eq!(Ticket::default().next(), Ticket(1));
    }
}
