//! 程序运行函数.

use crate::result::RunSummary;
use crate::Args;
use log::{info, warn};
use oasis_berry::catalog::{raw_listing, scan_archive, Catalog};
use oasis_berry::clinical::ClinicalStore;
use oasis_berry::convert::{run_tasks, ConvertOptions, ConvertTask};
use oasis_berry::post_proc::{image_stats, resize_tree, write_stats};
use oasis_berry::reconcile::ReconcileOptions;
use oasis_berry::Result;
use utils::loader;

/// 实际运行: 建表, 持久化, 差异比对, 导出, 以及可选的缩放和统计.
pub fn run(args: &Args) -> Result<RunSummary> {
    let layout = loader::open_archive(args.archive_root.as_ref())?;
    println!("Archive: {}", layout.root().display());

    println!("Building reference catalog...");
    let store = ClinicalStore::discover(layout.root())?;
    let scan = scan_archive(layout.original())?;
    let reconcile = ReconcileOptions {
        window_days: args.window_days,
    };
    let catalog = Catalog::from_scan(&scan, &store, &reconcile);
    catalog.persist(layout.catalog_path())?;
    let drift = catalog.compare_with(&raw_listing(layout.original()));
    if drift.is_clean() {
        info!("Catalog matches the archive listing");
    } else {
        warn!(
            "Catalog drift: {} missing from listing, {} missing from catalog",
            drift.missing_from_listing.len(),
            drift.missing_from_catalog.len()
        );
    }

    let mut summary = RunSummary::new(&catalog, &scan, drift);
    if args.catalog_only {
        return Ok(summary);
    }

    println!("Converting volumes...");
    let opts = ConvertOptions {
        workers: args.workers.unwrap_or_else(utils::cpus).max(1),
        frames: args.frames.max(1),
    };
    let tasks = scan
        .groups
        .into_iter()
        .map(|g| ConvertTask::new(g, &catalog))
        .collect();
    summary.conversion = Some(run_tasks(tasks, &layout.preprocessed(), &opts));

    if let Some(side) = args.resize {
        println!("Resizing slices...");
        summary.resize = Some(resize_tree(layout.preprocessed(), layout.results(), side)?);
    }
    if args.stats {
        println!("Collecting image stats...");
        let stats = image_stats(layout.preprocessed())?;
        write_stats(&stats, layout.stats_path())?;
        summary.stats_rows = Some(stats.len());
    }
    Ok(summary)
}
