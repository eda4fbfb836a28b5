//! 扫描与临床记录对齐.
//!
//! 按代际的时间结构分三种策略:
//!
//! 1. 横断面 (OASIS-1): 受试者标识 (即 `OAS1_xxxx_MRy`) 直接匹配, 取表格顺序中的第一条.
//! 2. 会话键 (OASIS-2): 以 `MRI ID` 匹配, 报告该记录的 `MR Delay`.
//! 3. 纵向 (OASIS-3/4): 覆盖表优先; 否则在受试者的记录中,
//!   先取 ±窗口内天数差最小的记录, 再退化为全局天数差最小的记录.
//!
//! 所有选择都是确定的: 天数差相同时取表格顺序中的第一条.

use crate::clinical::{ClinicalRecord, ClinicalStore};
use crate::consts::DEFAULT_WINDOW_DAYS;
use crate::taxonomy::{ScanFields, Timeline};
use crate::Diagnosis;
use std::fmt;

/// 对齐参数.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReconcileOptions {
    /// 纵向数据的对称匹配窗口 (天), 含边界.
    pub window_days: i64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

/// 标签来自哪一级匹配.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MatchTier {
    /// 横断面按受试者匹配.
    CrossSectional,

    /// 按会话标识匹配.
    Session,

    /// 覆盖表.
    Override,

    /// 窗口内最近记录.
    Window,

    /// 窗口外的全局最近记录.
    Closest,

    /// 没有可用记录.
    Unmatched,
}

impl MatchTier {
    /// 名字, 写入目录表.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CrossSectional => "cross-sectional",
            Self::Session => "session",
            Self::Override => "override",
            Self::Window => "window",
            Self::Closest => "closest",
            Self::Unmatched => "unmatched",
        }
    }

    /// 从名字解析.
    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::CrossSectional,
            Self::Session,
            Self::Override,
            Self::Window,
            Self::Closest,
            Self::Unmatched,
        ]
        .into_iter()
        .find(|t| t.as_str() == s)
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对齐结果.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Resolution {
    /// 诊断.
    pub diagnosis: Diagnosis,

    /// 原始 CDR 评分.
    pub score: Option<f64>,

    /// 命中记录的天数.
    pub matched_day: Option<i64>,

    /// 命中级别.
    pub tier: MatchTier,
}

impl Resolution {
    /// 无匹配.
    pub const UNMATCHED: Resolution = Resolution {
        diagnosis: Diagnosis::Unknown,
        score: None,
        matched_day: None,
        tier: MatchTier::Unmatched,
    };

    fn from_record(record: &ClinicalRecord, matched_day: Option<i64>, tier: MatchTier) -> Self {
        Self {
            diagnosis: record.diagnosis(),
            score: record.score,
            matched_day,
            tier,
        }
    }
}

/// 在 `records` 中选出天数与 `day` 最接近的记录.
///
/// 没有天数的记录不参与比较. `window` 为 `Some(w)` 时只考虑 `|Δday| <= w` 的记录.
/// 差值相同时返回迭代顺序中的第一条.
pub fn select_nearest<'a, I>(records: I, day: i64, window: Option<i64>) -> Option<&'a ClinicalRecord>
where
    I: IntoIterator<Item = &'a ClinicalRecord>,
{
    records
        .into_iter()
        .filter_map(|r| r.day.map(|d| (d.abs_diff(day), r)))
        .filter(|(delta, _)| window.map_or(true, |w| *delta <= w.unsigned_abs()))
        .min_by_key(|(delta, _)| *delta)
        .map(|(_, r)| r)
}

/// 为一个扫描确定诊断标签.
pub fn resolve(fields: &ScanFields, store: &ClinicalStore, opts: &ReconcileOptions) -> Resolution {
    let generation = fields.generation;
    match generation.timeline() {
        Timeline::CrossSectional => store
            .load(generation)
            .and_then(|t| t.by_subject(&fields.session_id()).next())
            .map_or(Resolution::UNMATCHED, |r| {
                Resolution::from_record(r, None, MatchTier::CrossSectional)
            }),
        Timeline::SessionKeyed => store
            .load(generation)
            .and_then(|t| t.by_assessment(&fields.session_id()).next())
            .map_or(Resolution::UNMATCHED, |r| {
                Resolution::from_record(r, r.day, MatchTier::Session)
            }),
        Timeline::Longitudinal => {
            let subject = fields.subject_id();
            if let Some(r) = store.override_for(generation, &subject) {
                return Resolution::from_record(r, None, MatchTier::Override);
            }
            let (Some(table), Some(day)) = (store.load(generation), fields.day_offset) else {
                return Resolution::UNMATCHED;
            };
            let records = table.by_subject(&subject);
            if let Some(r) = select_nearest(records.clone(), day, Some(opts.window_days)) {
                Resolution::from_record(r, r.day, MatchTier::Window)
            } else if let Some(r) = select_nearest(records, day, None) {
                Resolution::from_record(r, r.day, MatchTier::Closest)
            } else {
                Resolution::UNMATCHED
            }
        }
    }
}
