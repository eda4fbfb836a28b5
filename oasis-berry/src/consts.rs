//! 通用常量.

use std::ops::Range;

/// 临床量表源文件名. 这些文件可以位于归档根目录下的任意位置, 按文件名精确查找.
pub mod sources {
    /// OASIS-1 横断面人口学与 CDR 表.
    pub const OASIS1_CROSS_SECTIONAL: &str = "oasis1_cross-sectional.csv";

    /// OASIS-2 纵向人口学与 CDR 表 (Excel).
    pub const OASIS2_LONGITUDINAL: &str = "oasis2_longitudinal_demographics.xlsx";

    /// OASIS-3 UDS b4 CDR 评估表.
    pub const OASIS3_CDR: &str = "OASIS3_UDSb4_cdr.csv";

    /// OASIS-3 中诊断始终不变的受试者 ("unchanged" 队列).
    pub const OASIS3_UNCHANGED: &str = "OASIS3_unchanged_CDR_cognitively_healthy.csv";

    /// OASIS-4 CDR 评估表.
    pub const OASIS4_CDR: &str = "OASIS4_data_CDR.csv";
}

/// 归档目录布局.
pub mod layout {
    /// 原始扫描所在目录, 相对于归档根目录.
    pub const ORIGINAL_DIR: &str = "Original";

    /// 切片输出目录, 相对于归档根目录.
    pub const PREPROCESSED_DIR: &str = "Preprocessed";

    /// 参考目录表文件名, 位于输出目录下.
    pub const CATALOG_FILE: &str = "scan_catalog.csv";

    /// 缩放后切片的输出目录, 相对于归档根目录. 内部结构与切片输出目录相同.
    pub const RESULTS_DIR: &str = "RESULTS";

    /// 逐图像统计表文件名, 位于输出目录下.
    pub const STATS_FILE: &str = "image_stats.csv";

    /// 派生数据 (偏置校正, 去颅骨, 分割等) 所在目录的标记.
    /// 路径中任一目录名包含其中之一, 则该文件不作为原始扫描处理.
    pub const DERIVED_DIR_TOKENS: [&str; 4] = ["PROCESSED", "FSL_SEG", "T88_111", "SUBJ_111"];

    /// 表示分割结果的目录标记.
    pub const SEGMENTED_DIR_TOKEN: &str = "FSL_SEG";
}

/// 纵向数据按天匹配时的默认对称窗口 (天).
pub const DEFAULT_WINDOW_DAYS: i64 = 180;

/// 冠状面和轴状面切片的固定索引窗口.
///
/// 这是一个近似: 假设整个归档的体数据尺寸大致标准化.
pub const FIXED_SLICE_WINDOW: Range<usize> = 100..161;

/// 4D 数据默认选取的时间帧个数.
pub const DEFAULT_FRAMES: usize = 1;

/// 缩放后切片的默认边长 (像素).
pub const DEFAULT_RESIZED_SIDE: u32 = 128;
