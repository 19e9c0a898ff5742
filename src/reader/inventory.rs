// ==========================================
// 门店账本同步引擎 - 库存表读取
// ==========================================
// 固定行窗口迭代, 跳过空身份行与汇总行;
// 日销售 31 列读成稀疏 天→数量 映射（零值省略）
// ==========================================

use crate::domain::record::{ExchangeRates, InventoryData, ProductRow};
use crate::domain::schema::{DocumentSchema, RateCells};
use crate::reader::{cell, workbook, ReadError};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// 读取某月库存表的全部产品行
pub fn read_inventory(
    path: &Path,
    schema: &DocumentSchema,
    month: u32,
) -> Result<Vec<ProductRow>, ReadError> {
    let layout = schema.layout(month)?;
    let mut wb = workbook::open(path)?;
    let range = workbook::range(&mut wb, &schema.sheet_name(month))?;

    let mut rows = Vec::new();
    for row_num in layout.data_start_row..=layout.data_end_row {
        let identity: Vec<Option<String>> = schema
            .identity_cols
            .iter()
            .map(|&col| cell::to_str(workbook::cell(&range, row_num, col)))
            .collect();

        // 主键字段全空视为空行
        let primary_empty = schema
            .primary_fields
            .iter()
            .all(|&i| identity[i].is_none());
        if primary_empty {
            continue;
        }

        // 汇总行与说明行按首身份列标签跳过
        if let Some(first) = &identity[0] {
            let lowered = first.to_lowercase();
            if schema.summary_labels.iter().any(|l| l == &lowered) {
                continue;
            }
            if schema.skip_substrings.iter().any(|s| lowered.contains(s)) {
                continue;
            }
        }

        let mut prices = BTreeMap::new();
        for (name, col) in &schema.price_cols {
            prices.insert(
                name.clone(),
                cell::to_f64(workbook::cell(&range, row_num, *col), 0.0),
            );
        }

        let mut daily_sales = BTreeMap::new();
        for day in 1..=31u32 {
            let col = layout.day_column(day)?;
            let qty = cell::to_i64(workbook::cell(&range, row_num, col), 0);
            if qty > 0 {
                daily_sales.insert(day, qty);
            }
        }

        rows.push(ProductRow {
            row: row_num,
            identity,
            note: schema
                .note_col
                .and_then(|col| cell::to_str(workbook::cell(&range, row_num, col))),
            status: schema
                .status_col
                .and_then(|col| cell::to_str(workbook::cell(&range, row_num, col))),
            cost: cell::to_f64(workbook::cell(&range, row_num, schema.cost_col), 0.0),
            prices,
            initial_stock: cell::to_i64(
                workbook::cell(&range, row_num, layout.initial_stock_col),
                0,
            ),
            added_stock: cell::to_i64(
                workbook::cell(&range, row_num, layout.added_stock_col),
                0,
            ),
            daily_sales,
        });
    }

    debug!(月 = month, 行数 = rows.len(), "库存表读取完成");
    Ok(rows)
}

/// 读取某月库存表的汇率
///
/// 单汇率布局: 汇率缺失是结构错误（账本约定该单元格必填）;
/// 双汇率布局: 缺失宽松取 0。
pub fn read_rates(
    path: &Path,
    schema: &DocumentSchema,
    month: u32,
) -> Result<ExchangeRates, ReadError> {
    let layout = schema.layout(month)?;
    let mut wb = workbook::open(path)?;
    let range = workbook::range(&mut wb, &schema.sheet_name(month))?;

    match layout.rate_cells {
        RateCells::Single { row, col } => {
            let value = workbook::cell(&range, row, col);
            if cell::is_empty(value) {
                return Err(ReadError::RateMissing { row, col });
            }
            let rate = cell::to_f64(value, 0.0);
            Ok(ExchangeRates {
                cash_rate: rate,
                mukuru_rate: rate,
            })
        }
        RateCells::CashMukuru { cash, mukuru } => Ok(ExchangeRates {
            cash_rate: cell::to_f64(workbook::cell(&range, cash.0, cash.1), 0.0),
            mukuru_rate: cell::to_f64(workbook::cell(&range, mukuru.0, mukuru.1), 0.0),
        }),
    }
}

/// 库存文件一次性读取（产品行 + 汇率）
pub fn read_inventory_data(
    path: &Path,
    schema: &DocumentSchema,
    month: u32,
) -> Result<InventoryData, ReadError> {
    Ok(InventoryData {
        rows: read_inventory(path, schema, month)?,
        rates: read_rates(path, schema, month)?,
    })
}
