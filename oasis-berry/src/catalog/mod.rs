//! 参考目录表.
//!
//! 每个物理文件一行, 同组文件共享该组的诊断标签. 目录表只由这里写入,
//! 切片导出阶段只读.

mod walk;

pub use walk::{raw_listing, scan_archive, scan_files, ArchiveScan, VolumeFiles, VolumeGroup};

use crate::clinical::ClinicalStore;
use crate::dataset::ArchiveLayout;
use crate::reconcile::{resolve, ReconcileOptions, Resolution};
use crate::taxonomy::{Classified, MprSlot};
use crate::{Diagnosis, Result};
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// 目录表的一行.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    /// 代际标记, 例如 `OAS1`.
    pub generation: String,
    /// 绝对路径.
    pub path: String,
    /// 会话标识.
    pub folder: String,
    /// CDR 评分.
    pub label_id: Option<f64>,
    /// 诊断标签名.
    pub label: String,
    /// 受试者标识.
    pub subject_id: String,
    /// 模态.
    pub modality: String,
    /// 会话编号.
    pub session: u32,
    /// BIDS `run-`.
    pub run_id: Option<u32>,
    /// BIDS `acq-`.
    pub acq: Option<String>,
    /// BIDS `echo-`.
    pub echo: Option<u32>,
    /// 单次扫描编号.
    pub scan_id: Option<u32>,
    /// 平均图像编号.
    pub average_image_id: Option<u32>,
    /// 存储分类.
    pub subdirectory: String,
    /// 预处理空间.
    pub subsubdirectory: Option<String>,
    /// 掩膜限定词.
    pub masked: Option<String>,
    /// 去掉扩展名的规范文件名.
    pub file_name_wout_format: String,
    /// 扩展名.
    pub file_format: String,
    /// 扫描相对基线的天数.
    pub day_offset: Option<i64>,
    /// 命中临床记录的天数.
    pub matched_day: Option<i64>,
    /// 命中级别.
    pub match_tier: String,
}

impl CatalogRow {
    /// 由一个已分类文件和它所在组的对齐结果构造.
    pub fn new(file: &Classified, resolution: &Resolution) -> Self {
        let f = &file.fields;
        let (scan_id, average_image_id) = match f.slot {
            Some(MprSlot::Scan(n)) => (Some(n), None),
            Some(MprSlot::Average(n)) => (None, Some(n)),
            None => (None, None),
        };
        Self {
            generation: f.generation.tag().to_owned(),
            path: file.path.to_string_lossy().into_owned(),
            folder: f.session_id(),
            label_id: resolution.diagnosis.score(),
            label: resolution.diagnosis.as_str().to_owned(),
            subject_id: f.subject_id(),
            modality: f.modality.clone(),
            session: f.session,
            run_id: f.run,
            acq: f.acq.clone(),
            echo: f.echo,
            scan_id,
            average_image_id,
            subdirectory: f.storage.as_str().to_owned(),
            subsubdirectory: f.space.map(|s| s.as_str().to_owned()),
            masked: f.masking.map(|m| m.as_str().to_owned()),
            file_name_wout_format: f.base_name.clone(),
            file_format: f.format.as_str().to_owned(),
            day_offset: f.day_offset,
            matched_day: resolution.matched_day,
            match_tier: resolution.tier.as_str().to_owned(),
        }
    }

    /// 诊断. 标签名无法识别时为 `Unknown`.
    #[inline]
    pub fn diagnosis(&self) -> Diagnosis {
        Diagnosis::from_label(&self.label).unwrap_or(Diagnosis::Unknown)
    }
}

/// 目录表与某个独立枚举的文件列表之间的差异.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogDrift {
    /// 在目录表中, 但不在列表中.
    pub missing_from_listing: Vec<PathBuf>,

    /// 在列表中, 但不在目录表中.
    pub missing_from_catalog: Vec<PathBuf>,
}

impl CatalogDrift {
    /// 两者是否一致.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.missing_from_listing.is_empty() && self.missing_from_catalog.is_empty()
    }
}

/// 参考目录表.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    rows: Vec<CatalogRow>,
    labels: HashMap<String, Diagnosis>,
}

impl Catalog {
    /// 从若干行构造.
    pub fn from_rows(rows: Vec<CatalogRow>) -> Self {
        let labels = rows
            .iter()
            .map(|r| (r.file_name_wout_format.clone(), r.diagnosis()))
            .collect();
        Self { rows, labels }
    }

    /// 以默认参数为 `archive_root` 构建目录表.
    pub fn build<P: AsRef<Path>>(archive_root: P) -> Result<Self> {
        let layout = ArchiveLayout::open(archive_root)?;
        let store = ClinicalStore::discover(layout.root())?;
        let scan = scan_archive(layout.original())?;
        Ok(Self::from_scan(&scan, &store, &ReconcileOptions::default()))
    }

    /// 对一次遍历结果逐组对齐.
    pub fn from_scan(scan: &ArchiveScan, store: &ClinicalStore, opts: &ReconcileOptions) -> Self {
        let n = scan.groups.len();
        let mut rows = Vec::with_capacity(n * 2);
        for (i, group) in scan.groups.iter().enumerate() {
            let resolution = resolve(group.fields(), store, opts);
            rows.extend(group.files().iter().map(|f| CatalogRow::new(f, &resolution)));
            if (i + 1) % 500 == 0 || i + 1 == n {
                info!("Reconciled {}/{n} volumes", i + 1);
            }
        }
        Self::from_rows(rows)
    }

    /// 写为 CSV. 父目录不存在时创建.
    pub fn persist<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(dest)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!("Catalog with {} rows written to `{}`", self.rows.len(), dest.display());
        Ok(())
    }

    /// 读取 [`Catalog::persist`] 写出的 CSV.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<CatalogRow>, _>>()?;
        Ok(Self::from_rows(rows))
    }

    /// 所有行.
    #[inline]
    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 某个基础文件名的诊断. 不在目录表中时为 `Unknown`.
    pub fn label_for(&self, base: &str) -> Diagnosis {
        self.labels.get(base).copied().unwrap_or(Diagnosis::Unknown)
    }

    /// 各诊断的体数据个数.
    pub fn label_counts(&self) -> Vec<(Diagnosis, usize)> {
        let counts = self.labels.values().copied().counts();
        Diagnosis::ALL
            .into_iter()
            .map(|d| (d, counts.get(&d).copied().unwrap_or(0)))
            .collect()
    }

    /// 与独立枚举的文件列表比对.
    pub fn compare_with<P: AsRef<Path>>(&self, listing: &[P]) -> CatalogDrift {
        let catalogued: BTreeSet<PathBuf> = self.rows.iter().map(|r| PathBuf::from(&r.path)).collect();
        let listed: BTreeSet<PathBuf> = listing.iter().map(|p| p.as_ref().to_path_buf()).collect();
        CatalogDrift {
            missing_from_listing: catalogued.difference(&listed).cloned().collect(),
            missing_from_catalog: listed.difference(&catalogued).cloned().collect(),
        }
    }
}
