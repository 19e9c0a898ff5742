// ==========================================
// 门店账本同步引擎 - 日销售文件读取
// ==========================================
// 日销售文件列结构与新版发票一致, 但:
// - 表名可能被引号包住, 按子串定位
// - 第 1 行大标题, 第 2 行表头, 第 3 行起数据
// - 付款表可以整张缺失（当天没有赊账回款）
// ==========================================

use crate::domain::record::DailyData;
use crate::domain::schema::DocumentSchema;
use crate::reader::{invoice, workbook, ReadError};
use calamine::Reader;
use std::path::Path;
use tracing::debug;

/// 日销售数据区起始行（第 2 行是表头）
const DAILY_DATA_START_ROW: u32 = 3;

/// 读取一个日销售文件（销售 + 付款）
pub fn read_daily(path: &Path, schema: &DocumentSchema) -> Result<DailyData, ReadError> {
    let mut wb = workbook::open(path)?;

    let sales_sheet = workbook::find_sheet(&wb, "sales record").ok_or_else(|| {
        ReadError::SheetMissing {
            sheet: schema.invoice.sales_sheet.clone(),
            available: wb.sheet_names().to_vec(),
        }
    })?;
    let sales_range = wb
        .worksheet_range(&sales_sheet)
        .map_err(|e| ReadError::OpenError(e.to_string()))?;
    let sales = invoice::read_sales_rows(&sales_range, schema, DAILY_DATA_START_ROW);

    let payments = match workbook::find_sheet(&wb, "payment record") {
        Some(sheet) => {
            let range = wb
                .worksheet_range(&sheet)
                .map_err(|e| ReadError::OpenError(e.to_string()))?;
            invoice::read_payment_rows(&range, schema)
        }
        None => Vec::new(),
    };

    debug!(销售 = sales.len(), 付款 = payments.len(), "日销售文件读取完成");
    Ok(DailyData { sales, payments })
}
