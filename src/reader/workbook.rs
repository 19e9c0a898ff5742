// ==========================================
// 门店账本同步引擎 - 工作簿只读访问
// ==========================================
// 基于 calamine 的只读打开: 不持有写锁, 作用域结束即释放句柄
// ==========================================

use crate::reader::ReadError;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 只读工作簿句柄
pub type SheetWorkbook = Xlsx<BufReader<File>>;

/// 只读打开一个工作簿
pub fn open(path: &Path) -> Result<SheetWorkbook, ReadError> {
    if !path.exists() {
        return Err(ReadError::FileNotFound(path.display().to_string()));
    }
    open_workbook(path).map_err(|e: calamine::XlsxError| ReadError::OpenError(e.to_string()))
}

/// 取指定工作表的数据区, 表缺失时硬失败
pub fn range(wb: &mut SheetWorkbook, sheet: &str) -> Result<Range<Data>, ReadError> {
    let available = wb.sheet_names().to_vec();
    if !available.iter().any(|n| n == sheet) {
        return Err(ReadError::SheetMissing {
            sheet: sheet.to_string(),
            available,
        });
    }
    wb.worksheet_range(sheet)
        .map_err(|e| ReadError::OpenError(e.to_string()))
}

/// 按名称子串找表（小写比较, 去掉手填的引号）
///
/// 日销售文件的表名可能被引号包住（如 "'Sales Record'"）。
pub fn find_sheet(wb: &SheetWorkbook, needle: &str) -> Option<String> {
    wb.sheet_names()
        .iter()
        .find(|n| n.to_lowercase().replace('\'', "").contains(needle))
        .cloned()
}

/// 取单元格（1 起始行列号, 与账本 Excel 坐标一致）
pub fn cell<'a>(range: &'a Range<Data>, row: u32, col: u32) -> Option<&'a Data> {
    if row == 0 || col == 0 {
        return None;
    }
    range.get_value((row - 1, col - 1))
}

/// 数据区最大行号（1 起始）, 空表为 0
pub fn max_row(range: &Range<Data>) -> u32 {
    range.end().map(|(r, _)| r + 1).unwrap_or(0)
}
