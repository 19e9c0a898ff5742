// ==========================================
// 门店账本同步引擎 - 文档写入层
// ==========================================
// 职责: 带公式保护与先备份约束的工作簿批量写入
// 红线:
// - 目标列落在公式列集合内 → 任何变更前硬失败
// - 任何改写既有文件的保存前, 先落一份带时间戳的备份
// - 批量写遵循先清后写: 可写区整体置空, 再写全量快照
// ==========================================

use crate::domain::schema::LayoutError;
use thiserror::Error;

// 先备份
pub mod backup;

// 工作簿内存编辑模型
pub mod workbook;

// 库存表写入
pub mod inventory;

// 发票写入
pub mod invoice;

/// 写入层错误类型
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("拒绝写入: 列 {col} 是公式列, 公式列集合 {formula_cols:?} 禁止覆盖")]
    FormulaColumn { col: u32, formula_cols: Vec<u32> },

    #[error("工作表缺失: {0}")]
    SheetMissing(String),

    #[error("Excel 读取失败: {0}")]
    LoadError(String),

    #[error("Excel 写出失败: {0}")]
    SaveError(String),

    #[error("备份失败: {0}")]
    BackupError(String),

    #[error("布局错误: {0}")]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for WriteError {
    fn from(err: std::io::Error) -> Self {
        WriteError::BackupError(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for WriteError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        WriteError::SaveError(err.to_string())
    }
}
