//! 临床记录.
//!
//! 每代数据集一个源文件, 各自的列名统一映射为
//! (受试者, 评估, 天数, CDR) 四元组, 见 [`ClinicalSource::schema`].
//!
//! # 注意
//!
//! 1. 源文件缺失不是错误, 该代际的所有扫描都会得到 `unknown` 标签.
//! 2. 缺少必需列的源文件视为缺失, 只记录日志.
//! 3. 无法解析的 CDR 视为缺失; 无法解析的天数视为空.

mod table;

pub use table::{RawTable, Row};

use crate::consts::sources;
use crate::taxonomy::Generation;
use crate::{Diagnosis, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 临床表源文件.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ClinicalSource {
    /// `oasis1_cross-sectional.csv`.
    Oasis1,

    /// `oasis2_longitudinal_demographics.xlsx`.
    Oasis2,

    /// `OASIS3_UDSb4_cdr.csv`.
    Oasis3,

    /// `OASIS3_unchanged_CDR_cognitively_healthy.csv`, OASIS-3 覆盖表.
    Oasis3Unchanged,

    /// `OASIS4_data_CDR.csv`.
    Oasis4,
}

/// 一个源文件的列名映射.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Schema {
    /// 受试者列.
    pub subject: &'static str,

    /// 评估 (会话) 列.
    pub assessment: Option<&'static str>,

    /// 天数列.
    pub day: Option<&'static str>,

    /// CDR 列.
    pub score: &'static str,
}

impl ClinicalSource {
    /// 所有源文件.
    pub const ALL: [ClinicalSource; 5] = [
        Self::Oasis1,
        Self::Oasis2,
        Self::Oasis3,
        Self::Oasis3Unchanged,
        Self::Oasis4,
    ];

    /// 源文件名.
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Oasis1 => sources::OASIS1_CROSS_SECTIONAL,
            Self::Oasis2 => sources::OASIS2_LONGITUDINAL,
            Self::Oasis3 => sources::OASIS3_CDR,
            Self::Oasis3Unchanged => sources::OASIS3_UNCHANGED,
            Self::Oasis4 => sources::OASIS4_CDR,
        }
    }

    /// 所属代际.
    pub const fn generation(&self) -> Generation {
        match self {
            Self::Oasis1 => Generation::Oasis1,
            Self::Oasis2 => Generation::Oasis2,
            Self::Oasis3 | Self::Oasis3Unchanged => Generation::Oasis3,
            Self::Oasis4 => Generation::Oasis4,
        }
    }

    /// 列名映射.
    pub const fn schema(&self) -> Schema {
        match self {
            Self::Oasis1 => Schema {
                subject: "ID",
                assessment: Some("ID"),
                day: Some("Delay"),
                score: "CDR",
            },
            Self::Oasis2 => Schema {
                subject: "Subject ID",
                assessment: Some("MRI ID"),
                day: Some("MR Delay"),
                score: "CDR",
            },
            Self::Oasis3 => Schema {
                subject: "OASISID",
                assessment: Some("OASIS_session_label"),
                day: Some("days_to_visit"),
                score: "CDRTOT",
            },
            Self::Oasis3Unchanged => Schema {
                subject: "OASIS3_id",
                assessment: None,
                day: None,
                score: "Max of CDRTOT",
            },
            Self::Oasis4 => Schema {
                subject: "oasis_id",
                assessment: Some("cdr_id"),
                day: Some("visit_days"),
                score: "cdr",
            },
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.file_name() == name)
    }
}

/// 一条临床评估记录.
#[derive(Clone, Debug, PartialEq)]
pub struct ClinicalRecord {
    /// 受试者标识.
    pub subject: String,

    /// 评估标识.
    pub assessment: Option<String>,

    /// 相对基线的天数.
    pub day: Option<i64>,

    /// CDR 评分.
    pub score: Option<f64>,
}

impl ClinicalRecord {
    /// 评分对应的诊断.
    #[inline]
    pub fn diagnosis(&self) -> Diagnosis {
        Diagnosis::from_score(self.score)
    }
}

/// 解析 CDR. 空白、`NA` 以及非有限值视为缺失.
pub fn parse_score(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 解析天数. 允许 `129.0` 这种浮点写法 (Excel 导出常见), 四舍五入取整.
pub fn parse_day(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
            .map(|v| v.round() as i64)
    })
}

/// 一个源文件规范化后的记录, 保持表格行顺序, 按受试者和评估分组索引.
#[derive(Clone, Debug, Default)]
pub struct ClinicalTable {
    records: Vec<ClinicalRecord>,
    by_subject: HashMap<String, Vec<usize>>,
    by_assessment: HashMap<String, Vec<usize>>,
}

impl ClinicalTable {
    /// 从记录构造并建立分组索引.
    pub fn new(records: Vec<ClinicalRecord>) -> Self {
        let mut by_subject: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_assessment: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            by_subject.entry(r.subject.clone()).or_default().push(i);
            if let Some(a) = &r.assessment {
                by_assessment.entry(a.clone()).or_default().push(i);
            }
        }
        Self {
            records,
            by_subject,
            by_assessment,
        }
    }

    /// 按列名映射规范化一张原始表格. 受试者为空的行被丢弃.
    pub fn from_raw(raw: &RawTable, schema: &Schema) -> Result<Self> {
        let subject = raw.column(schema.subject)?;
        let score = raw.column(schema.score)?;
        let assessment = schema.assessment.map(|c| raw.column(c)).transpose()?;
        let day = schema.day.map(|c| raw.column(c)).transpose()?;

        let records: Vec<ClinicalRecord> = raw
            .rows()
            .filter(|row| !row.get(subject).is_empty())
            .map(|row| ClinicalRecord {
                subject: row.get(subject).to_owned(),
                assessment: assessment
                    .map(|i| row.get(i))
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned),
                day: day.and_then(|i| parse_day(row.get(i))),
                score: parse_score(row.get(score)),
            })
            .collect();
        let dropped = raw.len() - records.len();
        if dropped > 0 {
            debug!(
                "Dropped {dropped} rows without subject from `{}`",
                raw.path().display()
            );
        }
        Ok(Self::new(records))
    }

    /// 读取并规范化一个源文件.
    pub fn load<P: AsRef<Path>>(source: ClinicalSource, path: P) -> Result<Self> {
        let raw = RawTable::read(path)?;
        Self::from_raw(&raw, &source.schema())
    }

    /// 记录数.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否没有记录.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 某受试者的所有记录, 表格顺序.
    pub fn by_subject<'a>(&'a self, subject: &str) -> impl Iterator<Item = &'a ClinicalRecord> + Clone {
        self.lookup(self.by_subject.get(subject))
    }

    /// 某评估标识的所有记录, 表格顺序.
    pub fn by_assessment<'a>(
        &'a self,
        assessment: &str,
    ) -> impl Iterator<Item = &'a ClinicalRecord> + Clone {
        self.lookup(self.by_assessment.get(assessment))
    }

    fn lookup<'a>(
        &'a self,
        rows: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a ClinicalRecord> + Clone {
        rows.into_iter()
            .flatten()
            .map(move |&i| &self.records[i])
    }
}

/// 所有代际的临床表.
#[derive(Clone, Debug, Default)]
pub struct ClinicalStore {
    tables: HashMap<Generation, ClinicalTable>,
    overrides: HashMap<Generation, ClinicalTable>,
}

impl ClinicalStore {
    /// 空存储, 所有代际都没有临床表.
    pub fn new() -> Self {
        Self::default()
    }

    /// 在 `root` 下按文件名查找并加载所有源文件.
    ///
    /// 同名文件出现多次时取遍历顺序 (按文件名排序) 中的第一个.
    /// 单个源文件读取失败只记录日志, 视为缺失.
    pub fn discover<P: AsRef<Path>>(root: P) -> Result<Self> {
        let mut found: HashMap<ClinicalSource, PathBuf> = HashMap::new();
        for entry in WalkDir::new(root.as_ref()).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry while looking for clinical tables: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(source) = entry.file_name().to_str().and_then(ClinicalSource::from_file_name)
            else {
                continue;
            };
            found.entry(source).or_insert_with(|| entry.into_path());
        }

        let mut store = Self::new();
        for source in ClinicalSource::ALL {
            match found.get(&source) {
                Some(path) => match ClinicalTable::load(source, path) {
                    Ok(table) => {
                        info!(
                            "Loaded {} clinical records from `{}`",
                            table.len(),
                            path.display()
                        );
                        store.insert(source, table);
                    }
                    Err(e) => warn!("Ignoring clinical table `{}`: {e}", path.display()),
                },
                None => warn!(
                    "Clinical table `{}` not found, {} scans will be labelled unknown",
                    source.file_name(),
                    source.generation()
                ),
            }
        }
        Ok(store)
    }

    /// 放入一张表. 已有同源表时替换.
    pub fn insert(&mut self, source: ClinicalSource, table: ClinicalTable) {
        match source {
            ClinicalSource::Oasis3Unchanged => self.overrides.insert(source.generation(), table),
            _ => self.tables.insert(source.generation(), table),
        };
    }

    /// 某代际的临床表. 缺失时返回 `None`.
    #[inline]
    pub fn load(&self, generation: Generation) -> Option<&ClinicalTable> {
        self.tables.get(&generation)
    }

    /// 覆盖表中某受试者的记录. 只有 OASIS-3 有覆盖表.
    pub fn override_for(&self, generation: Generation, subject: &str) -> Option<&ClinicalRecord> {
        self.overrides.get(&generation)?.by_subject(subject).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse() {
        assert_eq!(parse_score("0.5"), Some(0.5));
        assert_eq!(parse_score(" 1 "), Some(1.0));
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("NA"), None);
        assert_eq!(parse_score("NaN"), None);
        assert_eq!(parse_day("129"), Some(129));
        assert_eq!(parse_day("-3"), Some(-3));
        assert_eq!(parse_day("129.0"), Some(129));
        assert_eq!(parse_day(""), None);
        assert_eq!(parse_day("d0129"), None);
    }

    #[test]
    fn test_load_oasis3() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(sources::OASIS3_CDR);
        fs::write(
            &path,
            "OASISID,OASIS_session_label,days_to_visit,CDRTOT,MMSE\n\
             OAS30001,OAS30001_UDSb4_d0000,0,0,30\n\
             OAS30001,OAS30001_UDSb4_d0339,339,0.5,29\n\
             OAS30002,OAS30002_UDSb4_d0000,,bad,\n\
             ,OAS30003_UDSb4_d0000,0,1,\n",
        )
        .unwrap();
        let table = ClinicalTable::load(ClinicalSource::Oasis3, &path).unwrap();
        assert_eq!(table.len(), 3);
        let recs: Vec<_> = table.by_subject("OAS30001").collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].day, Some(339));
        assert_eq!(recs[1].diagnosis(), Diagnosis::VeryMildDementia);
        let r = table.by_subject("OAS30002").next().unwrap();
        assert_eq!(r.day, None);
        assert_eq!(r.score, None);
        assert_eq!(table.by_subject("OAS30003").count(), 0);
        assert_eq!(
            table.by_assessment("OAS30001_UDSb4_d0339").next().unwrap().score,
            Some(0.5)
        );
    }

    #[test]
    fn test_missing_column_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(sources::OASIS4_CDR);
        fs::write(&path, "oasis_id,visit_days\nOAS40001,0\n").unwrap();
        assert!(ClinicalTable::load(ClinicalSource::Oasis4, &path).is_err());
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("clinical").join("oasis1");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            nested.join(sources::OASIS1_CROSS_SECTIONAL),
            "ID,M/F,CDR,Delay\nOAS1_0001_MR1,F,0,\nOAS1_0002_MR1,M,1,\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(sources::OASIS3_UNCHANGED),
            "OASIS3_id,Min of CDRTOT,Max of CDRTOT\nOAS30007,0,0\n",
        )
        .unwrap();
        // 缺少 CDR 列, 视为缺失.
        fs::write(dir.path().join(sources::OASIS4_CDR), "oasis_id\nOAS40001\n").unwrap();

        let store = ClinicalStore::discover(dir.path()).unwrap();
        let t1 = store.load(Generation::Oasis1).unwrap();
        assert_eq!(t1.len(), 2);
        assert_eq!(
            t1.by_subject("OAS1_0002_MR1").next().unwrap().diagnosis(),
            Diagnosis::MildDementia
        );
        assert!(store.load(Generation::Oasis2).is_none());
        assert!(store.load(Generation::Oasis3).is_none());
        assert!(store.load(Generation::Oasis4).is_none());
        assert_eq!(
            store.override_for(Generation::Oasis3, "OAS30007").unwrap().score,
            Some(0.0)
        );
        assert!(store.override_for(Generation::Oasis3, "OAS30001").is_none());
        assert!(store.override_for(Generation::Oasis4, "OAS30007").is_none());
    }
}
