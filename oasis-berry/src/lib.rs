#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 整理 OASIS 1-4 代脑部 MRI/PET 扫描归档, 将扫描文件与临床 CDR
//! 诊断记录对齐, 并把 3D/4D 体数据导出为带诊断标签的 2D 切片图像.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 四代数据集的文件名语法、目录结构和临床表格式互不兼容,
//!   统一由 [`taxonomy`] 模块的有序语法表处理. 无法识别的文件只记录日志, 不会中断流程.
//! 2. 单个文件 (或单个体数据) 的任何错误都只影响它自己. 只有配置层面的错误
//!   (例如归档根目录不存在) 才会以 `Err` 的形式返回给调用者.
//!
//! # 开发计划
//!
//! ### 文件名分类 ✅
//!
//! 有序语法表, 首个完整匹配胜出. 派生目录 (`PROCESSED`, `FSL_SEG` 等)
//! 按完整路径排除. OASIS-2 的规范文件名需要借助上级会话目录名重建.
//!
//! 实现位于 `oasis-berry/src/taxonomy`.
//!
//! ### 临床记录加载 ✅
//!
//! 每代数据集一个 CSV/XLSX 源文件, 列名统一为 (受试者, 评估, 天数, CDR).
//! 源文件缺失不是错误.
//!
//! 实现位于 `oasis-berry/src/clinical`.
//!
//! ### 诊断标签对齐 ✅
//!
//! 横断面数据按受试者直接匹配; 纵向数据先看 "诊断稳定" 覆盖表,
//! 再在 ±180 天窗口内取最近记录, 最后退化到全局最近记录.
//!
//! 实现位于 `oasis-berry/src/reconcile.rs`.
//!
//! ### 参考目录表 ✅
//!
//! 遍历归档, 分组, 打标签, 持久化为 CSV. 支持与独立枚举的文件列表做差异比对.
//!
//! 实现位于 `oasis-berry/src/catalog`.
//!
//! ### 方向推断与切片导出 ✅
//!
//! 有仿射矩阵时按主轴映射, 否则按轴长排序猜测.
//! 4D 数据按方差挑选时间帧. 固定大小线程池并行导出, 支持断点续跑.
//!
//! 实现位于 `oasis-berry/src/orient.rs`, `oasis-berry/src/slice` 和 `oasis-berry/src/convert`.
//!
//! ### 缩放与统计 ✅
//!
//! 导出后的 PNG 树统一缩放为 128×128, 另存到 `RESULTS/`;
//! 逐图像统计均值、标准差、宽高和直方图偏度, 写为 CSV.
//!
//! 实现位于 `oasis-berry/src/post_proc`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private
//! API 提供文档.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

mod error;

pub use error::{Error, GroupError, Result};

pub mod diagnosis;

pub use diagnosis::Diagnosis;

pub mod taxonomy;

pub mod clinical;

pub mod reconcile;

pub mod catalog;

pub mod volume;

pub mod orient;

mod window;

pub use window::GrayWindow;

pub mod slice;

pub mod convert;

pub mod post_proc;

pub mod dataset;

pub mod prelude;
