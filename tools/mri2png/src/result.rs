//! 运行结果.

use oasis_berry::catalog::{ArchiveScan, Catalog, CatalogDrift};
use oasis_berry::convert::ConversionReport;
use oasis_berry::post_proc::ResizeReport;
use oasis_berry::Diagnosis;
use std::io::{self, Write};
use std::path::PathBuf;

const S4: &str = "    ";

/// 一次运行的汇总.
#[derive(Debug)]
pub struct RunSummary {
    catalog_rows: usize,
    labels: Vec<(Diagnosis, usize)>,
    unrecognised: usize,
    derived: usize,
    invalid_groups: usize,
    drift: CatalogDrift,
    pub conversion: Option<ConversionReport>,
    pub resize: Option<ResizeReport>,
    pub stats_rows: Option<usize>,
}

/// 至多列出的差异路径数.
const DRIFT_PREVIEW: usize = 5;

fn describe_paths<W: Write>(title: &str, paths: &[PathBuf], w: &mut W) -> io::Result<()> {
    writeln!(w, "{S4}{title}: {}", paths.len())?;
    for p in paths.iter().take(DRIFT_PREVIEW) {
        writeln!(w, "{S4}{S4}{}", p.display())?;
    }
    if paths.len() > DRIFT_PREVIEW {
        writeln!(w, "{S4}{S4}...")?;
    }
    Ok(())
}

impl RunSummary {
    pub fn new(catalog: &Catalog, scan: &ArchiveScan, drift: CatalogDrift) -> Self {
        Self {
            catalog_rows: catalog.len(),
            labels: catalog.label_counts(),
            unrecognised: scan.unrecognised.len(),
            derived: scan.derived,
            invalid_groups: scan.invalid_groups.len(),
            drift,
            conversion: None,
            resize: None,
            stats_rows: None,
        }
    }

    /// 是否有体数据导出或图像缩放失败.
    pub fn has_failures(&self) -> bool {
        self.conversion.as_ref().is_some_and(|r| r.failed() > 0)
            || self.resize.as_ref().is_some_and(|r| !r.failures.is_empty())
    }

    /// 将汇总写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "Catalog:")?;
        writeln!(w, "{S4}Rows: {}", self.catalog_rows)?;
        for (d, n) in &self.labels {
            writeln!(w, "{S4}Volumes labelled `{d}`: {n}")?;
        }
        writeln!(w, "{S4}Unrecognised files: {}", self.unrecognised)?;
        writeln!(w, "{S4}Derived files excluded: {}", self.derived)?;
        writeln!(w, "{S4}Invalid groups: {}", self.invalid_groups)?;

        writeln!(w, "Drift:")?;
        describe_paths("Missing from listing", &self.drift.missing_from_listing, w)?;
        describe_paths("Missing from catalog", &self.drift.missing_from_catalog, w)?;

        match &self.conversion {
            None => write!(w, "Conversion skipped")?,
            Some(r) => {
                writeln!(w, "Conversion:")?;
                writeln!(w, "{S4}Volumes: {}", r.total)?;
                writeln!(w, "{S4}Converted: {}", r.converted)?;
                writeln!(w, "{S4}Already done: {}", r.resumed)?;
                writeln!(w, "{S4}Images written: {}", r.images_written)?;
                writeln!(w, "{S4}Slices out of bounds: {}", r.out_of_bounds)?;
                write!(w, "{S4}Failed: {}", r.failed())?;
                for (base, reason) in &r.failures {
                    write!(w, "\n{S4}{S4}{base}: {reason}")?;
                }
            }
        }
        if let Some(r) = &self.resize {
            write!(
                w,
                "\nResize: {} resized, {} skipped, {} failed",
                r.resized,
                r.skipped,
                r.failures.len()
            )?;
        }
        if let Some(n) = self.stats_rows {
            write!(w, "\nImage stats: {n} rows")?;
        }
        Ok(())
    }

    /// 打印运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(1024);
        match self.describe_into(&mut buf) {
            Ok(()) => println!("{}", String::from_utf8_lossy(&buf)),
            Err(e) => eprintln!("Failed to describe summary: {e}"),
        }
        utils::sep();
    }
}
