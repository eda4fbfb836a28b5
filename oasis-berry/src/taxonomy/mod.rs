//! 扫描文件名分类.
//!
//! 四代 OASIS 数据集的命名语法互不兼容, 这里用一张有序语法表统一处理,
//! 把文件名解析为带类型的 [`ScanFields`].
//!
//! # 注意
//!
//! 1. 文件名必须被某条语法**完整**匹配. 不合并部分匹配.
//! 2. 语法按固定优先级尝试, 首个匹配胜出. 各语法设计为互斥, 因此优先级只是保险.
//! 3. 数字字段解析失败 (例如非 ASCII 数字或溢出) 时该文件视为无法识别, 不会回退到后续语法.

mod grammar;

use crate::consts::layout::{DERIVED_DIR_TOKENS, SEGMENTED_DIR_TOKEN};
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

pub use grammar::{classify, matching_rules, GrammarKind};

/// 数据集代际.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Generation {
    /// OASIS-1, 横断面.
    Oasis1,

    /// OASIS-2, 纵向, 以会话编号对齐.
    Oasis2,

    /// OASIS-3, 纵向, BIDS 命名.
    Oasis3,

    /// OASIS-4, 纵向, BIDS 命名.
    Oasis4,
}

/// 临床记录的时间结构, 决定对齐策略.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Timeline {
    /// 每个受试者 (会话) 只有一条记录.
    CrossSectional,

    /// 记录以会话编号为键, 文件名中没有天数.
    SessionKeyed,

    /// 记录带有相对基线的天数, 需要按天匹配.
    Longitudinal,
}

impl Generation {
    /// 所有代际.
    pub const ALL: [Generation; 4] = [Self::Oasis1, Self::Oasis2, Self::Oasis3, Self::Oasis4];

    /// 从代际编号构造. 只接受 1 到 4.
    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            1 => Some(Self::Oasis1),
            2 => Some(Self::Oasis2),
            3 => Some(Self::Oasis3),
            4 => Some(Self::Oasis4),
            _ => None,
        }
    }

    /// 代际编号.
    #[inline]
    pub const fn number(&self) -> u8 {
        match self {
            Self::Oasis1 => 1,
            Self::Oasis2 => 2,
            Self::Oasis3 => 3,
            Self::Oasis4 => 4,
        }
    }

    /// 代际标记, 例如 `OAS1`.
    #[inline]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Oasis1 => "OAS1",
            Self::Oasis2 => "OAS2",
            Self::Oasis3 => "OAS3",
            Self::Oasis4 => "OAS4",
        }
    }

    /// 该代际临床记录的时间结构.
    #[inline]
    pub const fn timeline(&self) -> Timeline {
        match self {
            Self::Oasis1 => Timeline::CrossSectional,
            Self::Oasis2 => Timeline::SessionKeyed,
            Self::Oasis3 | Self::Oasis4 => Timeline::Longitudinal,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 存储分类.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StorageClass {
    /// 原始扫描.
    Raw,

    /// 预处理结果 (配准, 偏置校正, 去颅骨).
    Processed,

    /// 组织分割结果.
    Segmented,
}

impl StorageClass {
    /// 目录名风格的名字.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::Processed => "PROCESSED",
            Self::Segmented => "FSL_SEG",
        }
    }
}

/// 预处理结果的空间.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ProcessedSpace {
    /// 受试者原生空间 (`_sbj_111`).
    Subject,

    /// Talairach 图谱空间 (`_111_t88`).
    Atlas,
}

impl ProcessedSpace {
    /// 目录名风格的名字.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "SUBJ_111",
            Self::Atlas => "T88_111",
        }
    }
}

/// 图谱空间结果的掩膜限定词.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Masking {
    /// `_gfc`.
    Gfc,

    /// `_masked_gfc`.
    MaskedGfc,

    /// `_gfc_fseg`, 分割结果.
    GfcFseg,
}

impl Masking {
    /// 限定词.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gfc => "gfc",
            Self::MaskedGfc => "masked_gfc",
            Self::GfcFseg => "gfc_fseg",
        }
    }
}

/// 文件格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum FileFormat {
    /// Analyze/NIfTI 成对格式的体素数据.
    Img,

    /// Analyze/NIfTI 成对格式的头部.
    Hdr,

    /// 单文件压缩 NIfTI.
    NiiGz,
}

impl FileFormat {
    /// 扩展名 (不含前导 `.`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Img => "img",
            Self::Hdr => "hdr",
            Self::NiiGz => "nii.gz",
        }
    }

    /// 从文件名的扩展名猜测格式.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".nii.gz") {
            Some(Self::NiiGz)
        } else if name.ends_with(".img") {
            Some(Self::Img)
        } else if name.ends_with(".hdr") {
            Some(Self::Hdr)
        } else {
            None
        }
    }
}

/// `mpr` 数字槽位的两种含义.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MprSlot {
    /// `mpr-<n>`: 单次扫描编号.
    Scan(u32),

    /// `mpr_n<n>`: 平均图像中参与平均的扫描数.
    Average(u32),
}

/// PET 示踪剂.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Tracer {
    /// 淀粉样蛋白示踪剂 AV45 (florbetapir).
    Av45,

    /// 淀粉样蛋白示踪剂 PIB.
    Pib,

    /// 葡萄糖代谢示踪剂 FDG.
    Fdg,
}

impl Tracer {
    /// 不区分大小写地解析 `acq-` 限定词.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AV45" => Some(Self::Av45),
            "PIB" => Some(Self::Pib),
            "FDG" => Some(Self::Fdg),
            _ => None,
        }
    }

    /// 规范名.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Av45 => "AV45",
            Self::Pib => "PIB",
            Self::Fdg => "FDG",
        }
    }
}

/// 从一个文件名中解析出的全部字段.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanFields {
    /// 命中的语法.
    pub kind: GrammarKind,

    /// 代际.
    pub generation: Generation,

    /// 受试者编号, 保留原始的前导零, 例如 `0001`.
    pub subject: String,

    /// 会话编号. OASIS-1/2 为 MR 编号, BIDS 为天数.
    pub session: u32,

    /// 相对基线的天数, 只有 BIDS 命名携带.
    pub day_offset: Option<i64>,

    /// `mpr` 槽位.
    pub slot: Option<MprSlot>,

    /// OASIS-2 导出序列号.
    pub series: Option<u32>,

    /// BIDS `run-`.
    pub run: Option<u32>,

    /// BIDS `echo-`.
    pub echo: Option<u32>,

    /// BIDS `acq-`.
    pub acq: Option<String>,

    /// 模态, 例如 `T1w`, `FLAIR`, `pet`. OASIS-1/2 固定为 `T1w`.
    pub modality: String,

    /// PET 示踪剂.
    pub tracer: Option<Tracer>,

    /// 存储分类.
    pub storage: StorageClass,

    /// 预处理空间.
    pub space: Option<ProcessedSpace>,

    /// 掩膜限定词.
    pub masking: Option<Masking>,

    /// 文件格式.
    pub format: FileFormat,

    /// 去掉扩展名的规范文件名, 同一体数据的各个文件共享它.
    pub base_name: String,
}

impl ScanFields {
    /// 受试者标识, 与临床表中的受试者列一致.
    ///
    /// OASIS-1/2 为 `OAS1_0001` 形式, OASIS-3/4 为 `OAS30001` 形式.
    pub fn subject_id(&self) -> String {
        match self.generation {
            Generation::Oasis1 | Generation::Oasis2 => {
                format!("{}_{}", self.generation.tag(), self.subject)
            }
            Generation::Oasis3 | Generation::Oasis4 => {
                format!("{}{}", self.generation.tag(), self.subject)
            }
        }
    }

    /// 会话标识. OASIS-1/2 为 `OAS1_0001_MR1`, 与临床表的评估列一致;
    /// OASIS-3/4 为 `OAS30001_d0129`.
    pub fn session_id(&self) -> String {
        match self.day_offset {
            Some(day) if !matches!(self.generation, Generation::Oasis1 | Generation::Oasis2) => {
                format!("{}_d{:04}", self.subject_id(), day)
            }
            _ => format!("{}_MR{}", self.subject_id(), self.session),
        }
    }
}

/// 一个已分类的物理文件.
#[derive(Clone, Debug, PartialEq)]
pub struct Classified {
    /// 文件路径, 与传入 [`classify_path`] 的一致.
    pub path: PathBuf,

    /// 磁盘上的原始文件名.
    pub file_name: String,

    /// 解析结果.
    pub fields: ScanFields,
}

impl Classified {
    /// 是否是原始扫描. 只有原始扫描参与目录表和切片导出.
    #[inline]
    pub fn is_raw(&self) -> bool {
        self.fields.storage == StorageClass::Raw
    }
}

/// 判断路径中的目录是否带有派生数据标记. 文件名本身不参与判断.
pub fn derived_storage(path: &Path) -> Option<StorageClass> {
    let mut hit = None;
    for dir in path.parent().into_iter().flat_map(Path::components) {
        let dir = dir.as_os_str().to_string_lossy();
        if dir.contains(SEGMENTED_DIR_TOKEN) {
            return Some(StorageClass::Segmented);
        }
        if DERIVED_DIR_TOKENS.iter().any(|t| dir.contains(t)) {
            hit = Some(StorageClass::Processed);
        }
    }
    hit
}

/// 按完整路径分类一个文件.
///
/// 与 [`classify`] 相比:
///
/// 1. OASIS-2 的文件名 (`mpr-1.nifti.img`) 不含受试者和会话, 需要与最近的
///   `OAS2_xxxx_MRy` 祖先目录名拼接成规范文件名后再分类;
/// 2. 路径中的派生目录标记会把存储分类改写为 `Processed`/`Segmented`,
///   即使文件名本身符合原始扫描语法.
///
/// 无法识别时返回 `None`.
pub fn classify_path(path: &Path) -> Option<Classified> {
    let file_name = path.file_name()?.to_str()?;
    let mut fields = match classify(file_name) {
        Some(fields) => fields,
        None => {
            let session_dir = grammar::oasis2_session_ancestor(path)?;
            let canonical = format!("{session_dir}_{file_name}");
            let fields = classify(&canonical)?;
            if fields.generation != Generation::Oasis2 {
                return None;
            }
            fields
        }
    };
    if let Some(storage) = derived_storage(path) {
        debug!(
            "`{}` lies in a derived subtree, classified as {}",
            path.display(),
            storage.as_str()
        );
        fields.storage = storage;
    }
    Some(Classified {
        path: path.to_path_buf(),
        file_name: file_name.to_owned(),
        fields,
    })
}
