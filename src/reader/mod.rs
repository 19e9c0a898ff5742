// ==========================================
// 门店账本同步引擎 - 文档读取层
// ==========================================
// 职责: 把库存/发票/日销售工作簿解析为纯数据记录
// 红线: 只读打开, 永不修改工作簿; 单元格宽松转换, 结构缺失硬失败
// ==========================================

use crate::domain::schema::LayoutError;
use thiserror::Error;

// 单元格宽松转换
pub mod cell;

// 工作簿只读打开与取表
pub mod workbook;

// 库存表读取
pub mod inventory;

// 发票读取（含新旧代际自动识别）
pub mod invoice;

// 日销售文件读取
pub mod daily;

/// 读取层错误类型
///
/// 仅结构性问题（文件/表缺失、打不开）会产生错误;
/// 行级数据问题在读取时宽松处理, 不在此层报错。
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("Excel 打开失败: {0}")]
    OpenError(String),

    #[error("工作表缺失: 需要 '{sheet}', 现有 {available:?}")]
    SheetMissing {
        sheet: String,
        available: Vec<String>,
    },

    #[error(
        "无法识别的发票格式: 现有工作表 {available:?}, \
         期望 '{new_sheet}'（新版）或 {old_sheets:?}（旧版）"
    )]
    UnknownInvoiceFormat {
        available: Vec<String>,
        new_sheet: String,
        old_sheets: Vec<String>,
    },

    #[error("汇率缺失: 单元格 (行 {row}, 列 {col})")]
    RateMissing { row: u32, col: u32 },

    #[error("布局错误: {0}")]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
