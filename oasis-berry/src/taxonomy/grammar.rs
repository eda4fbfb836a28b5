//! 有序语法表.

use super::{
    FileFormat, Generation, Masking, MprSlot, ProcessedSpace, ScanFields, StorageClass, Tracer,
};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;
use std::str::FromStr;

/// 语法种类, 同时也是匹配优先级 (声明顺序).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GrammarKind {
    /// `OAS1_0001_MR1_mpr-1_anon[...].img`.
    Oasis1Session,

    /// `OAS2_0001_MR1_mpr-1.nifti.img`, 由会话目录名与文件名拼接而成.
    Oasis2Session,

    /// `OAS2_0001_MR1_3-1.nifti.img`, 部分 OASIS-2 副本中的编号导出.
    Oasis2Acquisition,

    /// `sub-OAS30001_ses-d0129[_acq-X][_echo-N][_run-N]_T1w.nii.gz`, OASIS-3/4.
    Bids,
}

struct GrammarRule {
    kind: GrammarKind,
    pattern: Regex,
    extract: fn(&Captures<'_>, &str) -> Option<ScanFields>,
}

// 字面量正则, 编译不会失败.
fn rule(
    kind: GrammarKind,
    pattern: &str,
    extract: fn(&Captures<'_>, &str) -> Option<ScanFields>,
) -> GrammarRule {
    GrammarRule {
        kind,
        pattern: Regex::new(pattern).expect("grammar pattern must compile"),
        extract,
    }
}

static RULES: Lazy<Vec<GrammarRule>> = Lazy::new(|| {
    vec![
        rule(
            GrammarKind::Oasis1Session,
            r"^OAS1_(\d{4})_MR(\d+)_mpr(-|_n)(\d+)_anon(?:(_sbj_111)|(_111_t88)(_masked)?_gfc(_fseg)?)?\.(img|hdr)$",
            extract_oasis1,
        ),
        rule(
            GrammarKind::Oasis2Session,
            r"^OAS2_(\d{4})_MR(\d+)_mpr-(\d+)\.nifti\.(img|hdr)$",
            extract_oasis2_session,
        ),
        rule(
            GrammarKind::Oasis2Acquisition,
            r"^OAS2_(\d{4})_MR(\d+)_(\d+)-(\d+)\.nifti\.(img|hdr)$",
            extract_oasis2_acquisition,
        ),
        rule(
            GrammarKind::Bids,
            r"^sub-OAS([34])(\d{4})_sess?-d(\d+)(?:_acq-([A-Za-z0-9]+))?(?:_echo-(\d+))?(?:_run-(\d+))?_([A-Za-z0-9]+)\.nii\.gz$",
            extract_bids,
        ),
    ]
});

/// OASIS-2 会话目录名.
static OASIS2_SESSION_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^OAS2_\d{4}_MR\d+$").expect("session pattern must compile"));

/// 分类一个文件名.
///
/// 首个完整匹配的语法胜出. 匹配成功但字段无法解析时返回 `None`, 不会继续尝试后续语法.
pub fn classify(file_name: &str) -> Option<ScanFields> {
    let (rule, caps) = RULES
        .iter()
        .find_map(|r| r.pattern.captures(file_name).map(|c| (r, c)))?;
    let fields = (rule.extract)(&caps, file_name);
    if fields.is_none() {
        warn!("`{file_name}` matches {:?} but has unparsable fields", rule.kind);
    } else {
        debug!("`{file_name}` classified as {:?}", rule.kind);
    }
    fields
}

/// 列出完整匹配该文件名的所有语法, 用于检查语法之间的互斥性.
pub fn matching_rules(file_name: &str) -> Vec<GrammarKind> {
    RULES
        .iter()
        .filter(|r| r.pattern.is_match(file_name))
        .map(|r| r.kind)
        .collect()
}

/// 查找最近的 OASIS-2 会话目录名.
pub(super) fn oasis2_session_ancestor(path: &Path) -> Option<&str> {
    path.parent()?
        .ancestors()
        .filter_map(|p| p.file_name()?.to_str())
        .find(|name| OASIS2_SESSION_DIR.is_match(name))
}

/// 解析一个数字捕获组. `\d` 会匹配 Unicode 数字, 这里只接受 ASCII, 并拒绝溢出.
fn number<T: FromStr>(caps: &Captures<'_>, i: usize) -> Option<T> {
    caps.get(i)?.as_str().parse().ok()
}

fn optional_number<T: FromStr>(caps: &Captures<'_>, i: usize) -> Option<Option<T>> {
    match caps.get(i) {
        Some(m) => m.as_str().parse().ok().map(Some),
        None => Some(None),
    }
}

/// 受试者编号保留前导零, 但必须是合法的 ASCII 数字.
fn subject(caps: &Captures<'_>, i: usize) -> Option<String> {
    let s = caps.get(i)?.as_str();
    s.parse::<u32>().ok()?;
    Some(s.to_owned())
}

fn paired_format(ext: &str) -> Option<FileFormat> {
    match ext {
        "img" => Some(FileFormat::Img),
        "hdr" => Some(FileFormat::Hdr),
        _ => None,
    }
}

fn strip_extension<'a>(file_name: &'a str, format: FileFormat) -> &'a str {
    file_name
        .strip_suffix(format.as_str())
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(file_name)
}

fn extract_oasis1(caps: &Captures<'_>, file_name: &str) -> Option<ScanFields> {
    let slot_n = number(caps, 4)?;
    let slot = match caps.get(3)?.as_str() {
        "-" => MprSlot::Scan(slot_n),
        _ => MprSlot::Average(slot_n),
    };
    let (storage, space, masking) = if caps.get(5).is_some() {
        (StorageClass::Processed, Some(ProcessedSpace::Subject), None)
    } else if caps.get(6).is_none() {
        (StorageClass::Raw, None, None)
    } else if caps.get(8).is_some() {
        (StorageClass::Segmented, Some(ProcessedSpace::Atlas), Some(Masking::GfcFseg))
    } else if caps.get(7).is_some() {
        (StorageClass::Processed, Some(ProcessedSpace::Atlas), Some(Masking::MaskedGfc))
    } else {
        (StorageClass::Processed, Some(ProcessedSpace::Atlas), Some(Masking::Gfc))
    };
    let format = paired_format(caps.get(9)?.as_str())?;
    Some(ScanFields {
        kind: GrammarKind::Oasis1Session,
        generation: Generation::Oasis1,
        subject: subject(caps, 1)?,
        session: number(caps, 2)?,
        day_offset: None,
        slot: Some(slot),
        series: None,
        run: None,
        echo: None,
        acq: None,
        modality: "T1w".to_owned(),
        tracer: None,
        storage,
        space,
        masking,
        format,
        base_name: strip_extension(file_name, format).to_owned(),
    })
}

fn extract_oasis2_session(caps: &Captures<'_>, file_name: &str) -> Option<ScanFields> {
    let format = paired_format(caps.get(4)?.as_str())?;
    Some(ScanFields {
        kind: GrammarKind::Oasis2Session,
        generation: Generation::Oasis2,
        subject: subject(caps, 1)?,
        session: number(caps, 2)?,
        day_offset: None,
        slot: Some(MprSlot::Scan(number(caps, 3)?)),
        series: None,
        run: None,
        echo: None,
        acq: None,
        modality: "T1w".to_owned(),
        tracer: None,
        storage: StorageClass::Raw,
        space: None,
        masking: None,
        format,
        base_name: strip_extension(file_name, format)
            .trim_end_matches(".nifti")
            .to_owned(),
    })
}

fn extract_oasis2_acquisition(caps: &Captures<'_>, file_name: &str) -> Option<ScanFields> {
    let format = paired_format(caps.get(5)?.as_str())?;
    Some(ScanFields {
        kind: GrammarKind::Oasis2Acquisition,
        generation: Generation::Oasis2,
        subject: subject(caps, 1)?,
        session: number(caps, 2)?,
        day_offset: None,
        slot: Some(MprSlot::Scan(number(caps, 4)?)),
        series: Some(number(caps, 3)?),
        run: None,
        echo: None,
        acq: None,
        modality: "T1w".to_owned(),
        tracer: None,
        storage: StorageClass::Raw,
        space: None,
        masking: None,
        format,
        base_name: strip_extension(file_name, format)
            .trim_end_matches(".nifti")
            .to_owned(),
    })
}

fn extract_bids(caps: &Captures<'_>, file_name: &str) -> Option<ScanFields> {
    let generation = Generation::from_number(number(caps, 1)?)?;
    let day: i64 = number(caps, 3)?;
    let acq = caps.get(4).map(|m| m.as_str().to_owned());
    let modality = caps.get(7)?.as_str().to_owned();
    let tracer = if modality.eq_ignore_ascii_case("pet") {
        let tracer = acq.as_deref().and_then(Tracer::parse);
        if tracer.is_none() {
            warn!("`{file_name}` is a PET scan with unknown tracer {acq:?}");
            return None;
        }
        tracer
    } else {
        None
    };
    Some(ScanFields {
        kind: GrammarKind::Bids,
        generation,
        subject: subject(caps, 2)?,
        session: u32::try_from(day).ok()?,
        day_offset: Some(day),
        slot: None,
        series: None,
        run: optional_number(caps, 6)?,
        echo: optional_number(caps, 5)?,
        acq,
        modality,
        tracer,
        storage: StorageClass::Raw,
        space: None,
        masking: None,
        format: FileFormat::NiiGz,
        base_name: strip_extension(file_name, FileFormat::NiiGz).to_owned(),
    })
}
