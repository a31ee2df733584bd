//! 运行时错误.
//!
//! 加载器对单个文件的失败总是就地恢复并记录日志, 不会向上传播;
//! 文件夹级别的失败 (完全没有数据) 只中止该次操作.

use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

use crate::roi::Roi;

/// 切片加载错误.
#[derive(Debug)]
pub enum LoadError {
    /// 文件夹中没有任何合法切片. 对 `open` 操作是致命的.
    NoInputData(PathBuf),

    /// 单个切片文件无法解析. 该文件会被跳过.
    InvalidSlice {
        /// 文件路径.
        path: PathBuf,
        /// 失败原因.
        reason: String,
    },

    /// 枚举文件夹时的底层 I/O 错误.
    Io(io::Error),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NoInputData(p) => write!(f, "文件夹 `{}` 中没有合法切片", p.display()),
            LoadError::InvalidSlice { path, reason } => {
                write!(f, "无法解析切片 `{}`: {reason}", path.display())
            }
            LoadError::Io(e) => write!(f, "I/O 错误: {e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LoadError {
    #[inline]
    fn from(value: io::Error) -> Self {
        LoadError::Io(value)
    }
}

/// 直接索引访问越界.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndexOutOfRange {
    /// 请求的索引.
    pub index: usize,
    /// 合法长度.
    pub len: usize,
}

impl Display for IndexOutOfRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "索引 {} 越界 (长度 {})", self.index, self.len)
    }
}

impl std::error::Error for IndexOutOfRange {}

/// 零面积 ROI.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EmptyRegion(pub Roi);

impl Display for EmptyRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ROI {:?} 与切片没有重叠或面积为零", self.0)
    }
}

impl std::error::Error for EmptyRegion {}

/// 缓存或导出写入失败.
#[derive(Debug)]
pub struct FileSystemError {
    /// 出错的路径.
    pub path: PathBuf,
    /// 底层错误.
    pub source: io::Error,
}

impl FileSystemError {
    #[inline]
    pub(crate) fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

impl Display for FileSystemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "无法写入 `{}`: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// 导出错误.
#[derive(Debug)]
pub enum ExportError {
    /// 目标目录或文件无法创建.
    FileSystem(FileSystemError),

    /// 位图编码失败.
    Image(image::ImageError),

    /// 请求的轮廓序号不存在.
    NoSuchContour {
        /// 请求的序号.
        rank: usize,
        /// 轮廓集合大小.
        len: usize,
    },
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::FileSystem(e) => e.fmt(f),
            ExportError::Image(e) => write!(f, "图像编码错误: {e}"),
            ExportError::NoSuchContour { rank, len } => {
                write!(f, "轮廓序号 {rank} 不存在 (共 {len} 个)")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::FileSystem(e) => Some(e),
            ExportError::Image(e) => Some(e),
            ExportError::NoSuchContour { .. } => None,
        }
    }
}

impl From<FileSystemError> for ExportError {
    #[inline]
    fn from(value: FileSystemError) -> Self {
        ExportError::FileSystem(value)
    }
}

impl From<image::ImageError> for ExportError {
    #[inline]
    fn from(value: image::ImageError) -> Self {
        ExportError::Image(value)
    }
}

/// 读取已导出轮廓的错误.
#[derive(Debug)]
pub enum ReloadError {
    /// 底层 I/O 错误.
    Io(io::Error),

    /// 点列文件内容无法解析.
    Parse {
        /// 文件路径.
        path: PathBuf,
        /// 失败原因.
        reason: String,
    },

    /// 文件名不是合法的导出 stem.
    BadStem(PathBuf),
}

impl Display for ReloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ReloadError::Io(e) => write!(f, "I/O 错误: {e}"),
            ReloadError::Parse { path, reason } => {
                write!(f, "无法解析 `{}`: {reason}", path.display())
            }
            ReloadError::BadStem(p) => write!(f, "`{}` 不是导出文件", p.display()),
        }
    }
}

impl std::error::Error for ReloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReloadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReloadError {
    #[inline]
    fn from(value: io::Error) -> Self {
        ReloadError::Io(value)
    }
}

/// 引擎命令的错误.
#[derive(Debug)]
pub enum EngineError {
    /// 打开的文件夹中没有合法切片. 引擎原有状态保持不变.
    NoInputData(PathBuf),

    /// 直接索引越界.
    IndexOutOfRange(IndexOutOfRange),

    /// ROI 面积为零.
    EmptyRegion(EmptyRegion),

    /// 缓存或导出写入失败.
    FileSystem(FileSystemError),

    /// 当前切片的轮廓仍在计算中, 调用方应提示用户稍后重试.
    NotReady,

    /// 尚未打开任何文件夹.
    NoFolder,

    /// 导出失败.
    Export(ExportError),

    /// 其它加载错误 (例如无法枚举文件夹).
    Load(LoadError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoInputData(p) => write!(f, "文件夹 `{}` 中没有合法切片", p.display()),
            EngineError::IndexOutOfRange(e) => e.fmt(f),
            EngineError::EmptyRegion(e) => e.fmt(f),
            EngineError::FileSystem(e) => e.fmt(f),
            EngineError::NotReady => f.write_str("轮廓尚未就绪"),
            EngineError::NoFolder => f.write_str("尚未打开文件夹"),
            EngineError::Export(e) => e.fmt(f),
            EngineError::Load(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::IndexOutOfRange(e) => Some(e),
            EngineError::EmptyRegion(e) => Some(e),
            EngineError::FileSystem(e) => Some(e),
            EngineError::Export(e) => Some(e),
            EngineError::Load(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LoadError> for EngineError {
    fn from(value: LoadError) -> Self {
        match value {
            LoadError::NoInputData(p) => EngineError::NoInputData(p),
            other => EngineError::Load(other),
        }
    }
}

macro_rules! impl_from_for_engine {
    ($($src: ty => $variant: ident),+) => {
        $(
            impl From<$src> for EngineError {
                #[inline]
                fn from(value: $src) -> Self {
                    EngineError::$variant(value)
                }
            }
        )+
    };
}

impl_from_for_engine!(
    IndexOutOfRange => IndexOutOfRange,
    EmptyRegion => EmptyRegion,
    FileSystemError => FileSystem,
    ExportError => Export
);

/// 引擎操作结果.
pub type EngineResult<T> = Result<T, EngineError>;
