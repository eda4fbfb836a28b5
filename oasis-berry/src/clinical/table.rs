//! 原始表格读取. 按扩展名分派到 `csv` 或 `calamine`.

use crate::{Error, Result};
use calamine::{open_workbook_auto, Reader};
use std::path::{Path, PathBuf};

/// 未经解释的二维字符串表格, 第一行为表头.
#[derive(Debug, Clone)]
pub struct RawTable {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// 读取表格. `.xlsx`/`.xls` 读取第一个工作表, 其余一律当作 CSV.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xlsx" | "xls" | "xlsm" | "ods") => Self::read_workbook(path),
            _ => Self::read_csv(path),
        }
    }

    fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
        if headers.is_empty() {
            return Err(Error::EmptyTable(path.to_path_buf()));
        }
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_owned).collect());
        }
        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    fn read_workbook(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::EmptyTable(path.to_path_buf()))??;
        let mut it = range.rows();
        let headers: Vec<String> = match it.next() {
            Some(row) => row.iter().map(|c| c.to_string().trim().to_owned()).collect(),
            None => return Err(Error::EmptyTable(path.to_path_buf())),
        };
        let rows = it
            .map(|row| row.iter().map(|c| c.to_string().trim().to_owned()).collect())
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    /// 源文件路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 数据行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有数据行.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 按列名查找列下标. 列名比较忽略首尾空白.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| Error::MissingColumn {
                path: self.path.clone(),
                column: name.to_owned(),
            })
    }

    /// 按行顺序遍历. 行长度不足时缺失单元格视为空串.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { cells })
    }
}

/// 表格中的一行.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// 第 `i` 个单元格, 已去除首尾空白.
    #[inline]
    pub fn get(&self, i: usize) -> &'a str {
        self.cells.get(i).map_or("", |s| s.trim())
    }
}
