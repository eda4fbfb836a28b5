//! 二维切片及其持久化.

mod core;
mod range;
mod save;

pub use self::core::VolumeSlice;

pub use range::SlicePolicy;

pub use save::ImgWriteVis;
