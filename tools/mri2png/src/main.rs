//! 整理 OASIS 归档, 生成参考目录表, 并把体数据导出为带诊断标签的 PNG 切片.

mod result;
mod runner;

use clap::{ArgAction, Parser};
use log::{error, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::process::ExitCode;

/// 命令行参数.
#[derive(Parser, Debug)]
#[command(name = "mri2png", version, about)]
pub struct Args {
    /// 归档根目录. 缺省时依次尝试 `$OASIS_ARCHIVE_DIR` 与 `$HOME/dataset/oasis`.
    #[arg(value_name = "ARCHIVE_ROOT")]
    pub archive_root: Option<PathBuf>,

    /// 导出线程数. 缺省为可用核心数.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// 纵向数据的匹配窗口 (天).
    #[arg(long, default_value_t = oasis_berry::consts::DEFAULT_WINDOW_DAYS)]
    pub window_days: i64,

    /// 4D 数据按方差选取的时间帧数.
    #[arg(long, default_value_t = oasis_berry::consts::DEFAULT_FRAMES)]
    pub frames: usize,

    /// 只生成目录表, 不导出切片.
    #[arg(long)]
    pub catalog_only: bool,

    /// 导出后把切片缩放为 `SIDE × SIDE` (通常为 128), 写到 `RESULTS/`.
    #[arg(long, value_name = "SIDE", value_parser = clap::value_parser!(u32).range(1..))]
    pub resize: Option<u32>,

    /// 导出后统计每张切片的像素分布, 写到 `Preprocessed/image_stats.csv`.
    #[arg(long)]
    pub stats: bool,

    /// 日志详细程度, 可重复 (`-v` 为 debug, `-vv` 为 trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = SimpleLogger::new().with_level(args.log_level()).env().init() {
        eprintln!("Failed to install logger: {e}");
    }

    match runner::run(&args) {
        Ok(summary) => {
            summary.analyze();
            if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
