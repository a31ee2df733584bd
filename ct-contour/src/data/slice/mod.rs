//! 二维强度切片对象的操作.

mod core;
mod save;

pub use core::{OwnedSlice, SliceView};

pub use save::{ImgWriteRaw, ImgWriteVis};
