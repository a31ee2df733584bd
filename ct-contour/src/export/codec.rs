//! 导出文件名 (stem) 的编解码.
//!
//! 格式为 `{id}-{放大倍数}-{切片索引}-{轮廓排名}-{阈值}`, 其中 `id`
//! 是导出时刻的 SHA-1 十六进制摘要前缀.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use sha1::{Digest, Sha1};

/// 生成导出结果时的参数.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Provenance {
    /// 切片放大倍数.
    pub scale_factor: u32,
    /// 切片索引.
    pub slice_index: usize,
    /// 轮廓在集合中的排名.
    pub contour_rank: usize,
    /// 提取阈值.
    pub threshold: u8,
}

/// 导出文件名公共部分.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExportStem {
    /// 十六进制导出标识.
    pub export_id: String,
    /// 参数.
    pub provenance: Provenance,
}

/// 进程内单调计数器. 同一时钟刻度内的两次导出依靠它区分.
static EXPORT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 生成长度为 `len` (最多 40) 的十六进制导出标识.
pub fn new_export_id(len: usize) -> String {
    let now = Local::now();
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));
    let seq = EXPORT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let text = format!("{nanos}-{}-{seq}", std::process::id());

    let digest = Sha1::digest(text.as_bytes());
    let mut hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(len);
    hex
}

impl ExportStem {
    /// 直接创建.
    #[inline]
    pub fn new(export_id: String, provenance: Provenance) -> Self {
        Self {
            export_id,
            provenance,
        }
    }

    /// 以新生成的、长度为 `id_len` 的标识创建.
    #[inline]
    pub fn generate(provenance: Provenance, id_len: usize) -> Self {
        Self::new(new_export_id(id_len), provenance)
    }

    /// 编码为文件名公共部分.
    pub fn encode(&self) -> String {
        let p = &self.provenance;
        format!(
            "{}-{}-{}-{}-{}",
            self.export_id, p.scale_factor, p.slice_index, p.contour_rank, p.threshold
        )
    }

    /// 从 stem 或以 stem 开头的文件名 (例如 `*.bmp`, `*-bkg.bmp`, `*.txt`) 解码.
    ///
    /// 格式不符时返回 `None`.
    pub fn decode(name: &str) -> Option<Self> {
        let mut fields = name.splitn(5, '-');
        let export_id = fields.next()?;
        if export_id.is_empty() || !export_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let scale_factor = fields.next()?.parse().ok()?;
        let slice_index = fields.next()?.parse().ok()?;
        let contour_rank = fields.next()?.parse().ok()?;

        // 阈值之后只允许出现扩展名或 `-bkg` 后缀.
        let rest = fields.next()?;
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (digits, tail) = rest.split_at(end);
        if !(tail.is_empty() || tail.starts_with('.') || tail.starts_with("-bkg")) {
            return None;
        }
        let threshold = digits.parse().ok()?;

        Some(Self {
            export_id: export_id.to_owned(),
            provenance: Provenance {
                scale_factor,
                slice_index,
                contour_rank,
                threshold,
            },
        })
    }
}
