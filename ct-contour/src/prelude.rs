//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{ImgWriteRaw, ImgWriteVis, IntensityWindow, OwnedSlice, SliceView, Volume};

pub use crate::config::{Config, CorrectionParams, ExtractParams, SmoothParams};
pub use crate::contour::{Contour, ContourSet, Point};
pub use crate::engine::{Engine, EngineEvent, ExportOutcome};
pub use crate::error::{EngineError, EngineResult};
pub use crate::export::{ExportRecord, ExportStem, Provenance};
pub use crate::roi::{Roi, RoiSelector};
pub use crate::volume::{VolumeManager, VolumeOrigin};
