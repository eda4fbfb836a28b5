//! 切片导出流水线.
//!
//! 每个体数据一个任务, 任务自带体数据组和从目录表中查到的诊断标签,
//! 通过 `mpsc` 通道交给固定大小的线程池执行. 结果按完成顺序收集.
//!
//! # 注意
//!
//! 1. 单个任务的任何错误 (包括 panic) 只影响它自己, 记录日志后整批继续.
//! 2. 断点续跑以输出目录中的文件为准: 只要存在文件名包含 `_<base>_` 的文件,
//!   该体数据就被视为已完成. 因此中途失败留下的部分输出也会让它在下次运行时被跳过.

mod resume;

pub use resume::{already_converted, slice_dir, slice_file_name};

use crate::catalog::{scan_archive, Catalog, VolumeGroup};
use crate::consts::DEFAULT_FRAMES;
use crate::orient::{infer, select_frames, slice_along, Orientation};
use crate::slice::{ImgWriteVis, SlicePolicy, VolumeSlice};
use crate::volume::MriVolume;
use crate::{Diagnosis, Error, Result};
use log::{debug, info, warn};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use threadpool::ThreadPool;

/// 导出参数.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConvertOptions {
    /// 工作线程数, 至少为 1. 默认单线程, 由调用方按可用核心数设置.
    pub workers: usize,

    /// 4D 数据选取的时间帧数, 至少为 1.
    pub frames: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            frames: DEFAULT_FRAMES,
        }
    }
}

/// 一个导出任务.
#[derive(Clone, Debug)]
pub struct ConvertTask {
    /// 体数据组.
    pub group: VolumeGroup,

    /// 诊断标签, 决定输出目录.
    pub diagnosis: Diagnosis,

    /// 切片范围策略.
    pub policy: SlicePolicy,
}

impl ConvertTask {
    /// 从目录表中查找标签并构造任务.
    pub fn new(group: VolumeGroup, catalog: &Catalog) -> Self {
        let diagnosis = catalog.label_for(group.base());
        let policy = SlicePolicy::for_fields(group.fields());
        Self {
            group,
            diagnosis,
            policy,
        }
    }
}

/// 单个任务的结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// 成功导出.
    Converted {
        /// 基础文件名.
        base: String,
        /// 写出的图像数.
        written: usize,
        /// 因越界而跳过的切片数.
        out_of_bounds: usize,
    },

    /// 已有输出, 跳过.
    AlreadyDone {
        /// 基础文件名.
        base: String,
    },

    /// 失败.
    Failed {
        /// 基础文件名.
        base: String,
        /// 错误描述.
        reason: String,
    },
}

impl TaskOutcome {
    /// 基础文件名.
    pub fn base(&self) -> &str {
        match self {
            Self::Converted { base, .. } | Self::AlreadyDone { base } | Self::Failed { base, .. } => {
                base
            }
        }
    }
}

/// 一批任务的汇总.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// 任务总数.
    pub total: usize,

    /// 成功导出的体数据数.
    pub converted: usize,

    /// 因已有输出而跳过的体数据数.
    pub resumed: usize,

    /// 写出的图像总数.
    pub images_written: usize,

    /// 因越界而跳过的切片总数.
    pub out_of_bounds: usize,

    /// 失败的体数据及原因.
    pub failures: Vec<(String, String)>,
}

impl ConversionReport {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Converted {
                written,
                out_of_bounds,
                ..
            } => {
                self.converted += 1;
                self.images_written += written;
                self.out_of_bounds += out_of_bounds;
            }
            TaskOutcome::AlreadyDone { .. } => self.resumed += 1,
            TaskOutcome::Failed { base, reason } => self.failures.push((base, reason)),
        }
    }

    /// 失败的体数据数.
    #[inline]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// 导出 `original_root` 下的所有体数据到 `output_root`.
///
/// 只有 `original_root` 不存在时返回 `Err`.
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
    original_root: P,
    output_root: Q,
    catalog: &Catalog,
    opts: &ConvertOptions,
) -> Result<ConversionReport> {
    let scan = scan_archive(original_root)?;
    let tasks = scan
        .groups
        .into_iter()
        .map(|g| ConvertTask::new(g, catalog))
        .collect();
    Ok(run_tasks(tasks, output_root.as_ref(), opts))
}

/// 在固定大小的线程池上执行任务.
pub fn run_tasks(tasks: Vec<ConvertTask>, output_root: &Path, opts: &ConvertOptions) -> ConversionReport {
    let total = tasks.len();
    let mut report = ConversionReport {
        total,
        ..Default::default()
    };
    if total == 0 {
        return report;
    }

    let workers = opts.workers.clamp(1, total);
    info!("Converting {total} volumes with {workers} workers");
    let pool = ThreadPool::new(workers);
    let (tx, rx) = mpsc::channel();
    let output_root = Arc::new(output_root.to_path_buf());
    let frames = opts.frames.max(1);
    for task in tasks {
        let tx = tx.clone();
        let output_root = Arc::clone(&output_root);
        pool.execute(move || {
            let outcome = run_guarded(&task, &output_root, frames);
            // 接收端在所有结果到达之前不会关闭.
            let _ = tx.send(outcome);
        });
    }
    drop(tx);

    for (i, outcome) in rx.iter().enumerate() {
        info!("Complete: {}/{total} - {}", i + 1, outcome.base());
        report.record(outcome);
    }
    pool.join();
    info!(
        "Conversion finished: {} converted, {} resumed, {} failed, {} images",
        report.converted,
        report.resumed,
        report.failed(),
        report.images_written
    );
    report
}

/// 执行一个任务, 把错误和 panic 都转为 [`TaskOutcome::Failed`].
pub fn run_guarded(task: &ConvertTask, output_root: &Path, frames: usize) -> TaskOutcome {
    let base = task.group.base().to_owned();
    if already_converted(output_root, &base) {
        debug!("`{base}` already converted, skipping");
        return TaskOutcome::AlreadyDone { base };
    }
    match panic::catch_unwind(AssertUnwindSafe(|| convert_group(task, output_root, frames))) {
        Ok(Ok((written, out_of_bounds))) => TaskOutcome::Converted {
            base,
            written,
            out_of_bounds,
        },
        Ok(Err(e)) => {
            warn!("Failed to convert `{base}`: {e}");
            TaskOutcome::Failed {
                base,
                reason: e.to_string(),
            }
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_owned());
            warn!("Panic while converting `{base}`: {reason}");
            TaskOutcome::Failed { base, reason }
        }
    }
}

/// 解码一个体数据并写出所有切片. 返回 (写出数, 越界跳过数).
pub fn convert_group(task: &ConvertTask, output_root: &Path, frames: usize) -> Result<(usize, usize)> {
    let base = task.group.base();
    let volume = MriVolume::open(&task.group)?;
    let (nx, ny, nz) = volume.spatial_shape();
    let lens = [nx, ny, nz];
    let (axes, source) =
        infer(&lens, volume.affine()).ok_or_else(|| Error::BadShape(lens.to_vec()))?;
    debug!("`{base}` orientation {axes:?} from {source:?}");

    let selected = if volume.is_time_resolved() {
        select_frames(&volume, frames)
    } else {
        vec![0]
    };

    let mut written = 0;
    let mut out_of_bounds = 0;
    for &t in &selected {
        let frame = volume.frame(t);
        let frame_base = if volume.is_time_resolved() {
            format!("{base}_t{t}")
        } else {
            base.to_owned()
        };
        for orientation in Orientation::ALL {
            let axis = axes.axis(orientation);
            let len = lens[axis];
            let range = task.policy.range(orientation, len);
            let dir: PathBuf = slice_dir(output_root, orientation, task.diagnosis);
            if range.start < len {
                fs::create_dir_all(&dir)?;
            }
            let mut skipped = 0;
            for index in range.clone() {
                let Some(view) = slice_along(frame, axis, index) else {
                    skipped += 1;
                    continue;
                };
                let path = dir.join(slice_file_name(index, &frame_base, orientation));
                VolumeSlice::new(view).save(path)?;
                written += 1;
            }
            if skipped > 0 {
                info!(
                    "`{frame_base}` {orientation}: skipped {skipped} slices of {range:?} out of bounds (len {len})"
                );
            }
            out_of_bounds += skipped;
        }
    }
    Ok((written, out_of_bounds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{AnalyzeHeader, Datatype};
    use byteordered::Endianness;
    use std::fs::File;

    #[test]
    fn test_report() {
        let mut r = ConversionReport::default();
        r.record(TaskOutcome::Converted {
            base: "a".to_owned(),
            written: 10,
            out_of_bounds: 2,
        });
        r.record(TaskOutcome::AlreadyDone { base: "b".to_owned() });
        r.record(TaskOutcome::Failed {
            base: "c".to_owned(),
            reason: "bad".to_owned(),
        });
        assert_eq!(r.converted, 1);
        assert_eq!(r.resumed, 1);
        assert_eq!(r.failed(), 1);
        assert_eq!(r.images_written, 10);
        assert_eq!(r.out_of_bounds, 2);
    }

    #[test]
    fn test_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let r = run_tasks(vec![], dir.path(), &ConvertOptions::default());
        assert_eq!(r, ConversionReport::default());
    }

    #[test]
    fn test_default_options() {
        let o = ConvertOptions::default();
        assert_eq!(o.workers, 1);
        assert_eq!(o.frames, 1);
    }

    fn write_pair(dir: &Path, base: &str, shape: [usize; 3], voxels: usize) {
        fs::create_dir_all(dir).unwrap();
        let header = AnalyzeHeader::new(Endianness::Little, &shape, Datatype::U8).unwrap();
        header
            .to_writer(File::create(dir.join(format!("{base}.hdr"))).unwrap())
            .unwrap();
        let bytes: Vec<u8> = (0..voxels).map(|i| (i % 251) as u8).collect();
        fs::write(dir.join(format!("{base}.img")), bytes).unwrap();
    }

    #[test]
    fn test_bad_volume_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("Original");
        let out = dir.path().join("Preprocessed");
        let good = "OAS1_0001_MR1_mpr-1_anon";
        let bad = "OAS1_0002_MR1_mpr-1_anon";
        write_pair(&original.join("OAS1/OAS1_0001_MR1/RAW"), good, [8, 10, 12], 8 * 10 * 12);
        // 头部要求 960 字节, 实际只有 100 字节.
        write_pair(&original.join("OAS1/OAS1_0002_MR1/RAW"), bad, [8, 10, 12], 100);

        let opts = ConvertOptions {
            workers: 2,
            frames: 1,
        };
        let report = convert(&original, &out, &Catalog::default(), &opts).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.converted, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].0, bad);
        assert!(report.failures[0].1.contains("invalid header"));
        // 矢状面 2..6, 其余两个方向的固定窗口完全越界.
        assert_eq!(report.images_written, 4);
        assert_eq!(report.out_of_bounds, 61 * 2);

        let sagittal = out.join("Sagittal").join("unknown");
        let names: Vec<String> = fs::read_dir(&sagittal)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|n| n.contains(good) && !n.contains(bad)));
        assert!(!already_converted(&out, bad));
    }

    #[test]
    fn test_unwritable_output_fails_task() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("Original");
        let base = "OAS1_0003_MR1_mpr-1_anon";
        write_pair(&original.join("OAS1/OAS1_0003_MR1/RAW"), base, [8, 10, 12], 8 * 10 * 12);
        let scan = scan_archive(&original).unwrap();
        let task = ConvertTask::new(scan.groups[0].clone(), &Catalog::default());
        // 输出根目录是一个普通文件, 创建目录失败.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let outcome = run_guarded(&task, &blocker, 1);
        assert!(matches!(outcome, TaskOutcome::Failed { base: b, .. } if b == base));
    }
}
