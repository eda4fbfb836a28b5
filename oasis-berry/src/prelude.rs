//! 🧠欢迎光临🫐
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Diagnosis, Error, GrayWindow, Idx2d, Idx3d, Result};

pub use crate::taxonomy::{classify_path, Classified, FileFormat, Generation, ScanFields};

pub use crate::clinical::{ClinicalSource, ClinicalStore, ClinicalTable};
pub use crate::reconcile::{resolve, MatchTier, ReconcileOptions, Resolution};

pub use crate::catalog::{raw_listing, scan_archive, scan_files, Catalog, CatalogRow, VolumeGroup};

pub use crate::orient::{AxisMap, Orientation};
pub use crate::slice::{ImgWriteVis, SlicePolicy, VolumeSlice};
pub use crate::volume::MriVolume;

pub use crate::convert::{convert, ConversionReport, ConvertOptions};
pub use crate::post_proc::{image_stats, resize_tree, write_stats, ImageStats, ResizeReport};

pub use crate::dataset::{home_dataset_dir_with, ArchiveLayout};
