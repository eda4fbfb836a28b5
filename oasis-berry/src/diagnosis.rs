//! CDR 评分到诊断类别的映射.

use std::fmt;

/// 诊断类别. 同时也是输出目录中的标签目录名.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Diagnosis {
    /// CDR 0.
    NonDemented,

    /// CDR 0.5.
    VeryMildDementia,

    /// CDR 1.
    MildDementia,

    /// CDR 2.
    ModerateDementia,

    /// 评分缺失、无法识别, 或找不到临床记录.
    Unknown,
}

/// 进程级只读映射表.
const SCORE_TABLE: [(f64, Diagnosis); 4] = [
    (0.0, Diagnosis::NonDemented),
    (0.5, Diagnosis::VeryMildDementia),
    (1.0, Diagnosis::MildDementia),
    (2.0, Diagnosis::ModerateDementia),
];

impl Diagnosis {
    /// 所有类别, 按严重程度升序, `Unknown` 在最后.
    pub const ALL: [Diagnosis; 5] = [
        Self::NonDemented,
        Self::VeryMildDementia,
        Self::MildDementia,
        Self::ModerateDementia,
        Self::Unknown,
    ];

    /// 将 CDR 评分转换为诊断类别. 缺失或不在 {0, 0.5, 1, 2} 中的评分映射为 `Unknown`.
    pub fn from_score(score: Option<f64>) -> Self {
        score
            .and_then(|s| SCORE_TABLE.iter().find(|(v, _)| *v == s))
            .map_or(Self::Unknown, |(_, d)| *d)
    }

    /// 该类别对应的 CDR 评分. `Unknown` 返回 `None`.
    pub fn score(&self) -> Option<f64> {
        SCORE_TABLE
            .iter()
            .find(|(_, d)| d == self)
            .map(|(v, _)| *v)
    }

    /// 标签名, 也是目录名.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NonDemented => "non-demented",
            Self::VeryMildDementia => "very-mild-dementia",
            Self::MildDementia => "mild-dementia",
            Self::ModerateDementia => "moderate-dementia",
            Self::Unknown => "unknown",
        }
    }

    /// 从标签名解析. 不认识的名字返回 `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == label)
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
