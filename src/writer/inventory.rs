// ==========================================
// 门店账本同步引擎 - 库存表写出
// ==========================================
// 全量重写策略: 先清空可写区（期初/入库/日销售）, 再按行重写。
// 公式列由 set_guarded 保护, 任何触碰公式列的路径都会在落盘前失败。
// 目标月份表不存在时以相邻月份表为模板克隆补建。
// ==========================================

use crate::config::EngineConfig;
use crate::domain::schema::{DocumentSchema, RateCells, SheetLayout};
use crate::writer::backup::create_backup;
use crate::writer::workbook::{CellContent, SheetModel, WorkbookModel};
use crate::writer::WriteError;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

// ==========================================
// 写出输入与回执
// ==========================================
/// 一行的库存水平（已解析到目标行号）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowStock {
    pub row: u32,
    pub initial_stock: i64,
    pub added_stock: i64,
}

/// 某一天某行的售出数量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQty {
    pub row: u32,
    pub qty: i64,
}

/// 库存批量写出回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryWriteReport {
    pub records_written: usize,
    pub sheet_created: bool,
}

// ==========================================
// 批量导出
// ==========================================
/// 把一个月的库存水平与日销售批量写入账本
///
/// # 职责
/// 1. 写前备份（开关在 EngineConfig 上）
/// 2. 目标月份表缺失时克隆补建
/// 3. 清空全部可写区后按行重写, 零值留空
///
/// # 参数
/// - stock: 期初/入库水平, 按行号寻址
/// - sales_by_day: 天 → 当天各行售出数量
///
/// # 返回
/// - 写入记录数与是否补建了表
pub fn export_inventory_batch(
    path: &Path,
    schema: &DocumentSchema,
    month: u32,
    stock: &[RowStock],
    sales_by_day: &BTreeMap<u32, Vec<RowQty>>,
    config: &EngineConfig,
) -> Result<InventoryWriteReport, WriteError> {
    create_backup(path, config)?;

    let mut model = WorkbookModel::load(path)?;
    let layout = schema.layout(month)?.clone();
    let sheet_created = ensure_sheet_in_model(&mut model, schema, month)?;

    let sheet_name = schema.sheet_name(month);
    let sheet = model.sheet_mut(&sheet_name)?;

    // 先清后写: 残留的历史数值不允许幸存
    clear_writable_region(sheet, &layout);

    let mut records_written = 0usize;
    for s in stock {
        if s.initial_stock != 0 {
            sheet.set_guarded(
                s.row,
                layout.initial_stock_col,
                Some(CellContent::Number(s.initial_stock as f64)),
                &layout.formula_cols,
            )?;
        }
        if s.added_stock != 0 {
            sheet.set_guarded(
                s.row,
                layout.added_stock_col,
                Some(CellContent::Number(s.added_stock as f64)),
                &layout.formula_cols,
            )?;
        }
        records_written += 1;
    }

    for (&day, rows) in sales_by_day {
        let col = layout.day_column(day)?;
        for rq in rows {
            if rq.qty == 0 {
                continue;
            }
            sheet.set_guarded(
                rq.row,
                col,
                Some(CellContent::Number(rq.qty as f64)),
                &layout.formula_cols,
            )?;
            records_written += 1;
        }
    }

    model.save(path)?;
    info!(
        file = %path.display(),
        sheet = %sheet_name,
        records = records_written,
        created = sheet_created,
        "库存批量写出完成"
    );
    Ok(InventoryWriteReport {
        records_written,
        sheet_created,
    })
}

/// 确保目标月份表存在, 缺失时补建并落盘
///
/// 独立入口（月初建表用）, 返回是否新建。
pub fn ensure_period_sheet(
    path: &Path,
    schema: &DocumentSchema,
    month: u32,
    config: &EngineConfig,
) -> Result<bool, WriteError> {
    let mut model = WorkbookModel::load(path)?;
    let sheet_name = schema.sheet_name(month);
    if model.has_sheet(&sheet_name) {
        return Ok(false);
    }
    create_backup(path, config)?;
    ensure_sheet_in_model(&mut model, schema, month)?;
    model.save(path)?;
    info!(file = %path.display(), sheet = %sheet_name, "补建月份表");
    Ok(true)
}

/// 目标月份表缺失时补建（仅改模型, 不落盘）
///
/// 优先克隆上一个月份表（表头与公式随之带走）, 随后清空可写区;
/// 整簿没有可用模板时按结构生成表头。
fn ensure_sheet_in_model(
    model: &mut WorkbookModel,
    schema: &DocumentSchema,
    month: u32,
) -> Result<bool, WriteError> {
    let sheet_name = schema.sheet_name(month);
    if model.has_sheet(&sheet_name) {
        return Ok(false);
    }

    let template = (1..month)
        .rev()
        .map(|m| schema.sheet_name(m))
        .find(|name| model.has_sheet(name))
        .or_else(|| model.sheet_names().first().cloned());

    let layout = schema.layout(month)?.clone();
    match template {
        Some(template) => {
            debug!(template = %template, new = %sheet_name, "按模板克隆月份表");
            model.clone_sheet(&template, &sheet_name)?;
            let sheet = model.sheet_mut(&sheet_name)?;
            clear_writable_region(sheet, &layout);
        }
        None => {
            debug!(new = %sheet_name, "无模板, 按结构生成月份表");
            let sheet = model.add_sheet(&sheet_name);
            write_inventory_headers(sheet, schema, &layout);
        }
    }
    Ok(true)
}

/// 新建库存账本文件（目标路径不允许已存在）
pub fn create_inventory_file(
    path: &Path,
    schema: &DocumentSchema,
    month: u32,
) -> Result<(), WriteError> {
    if path.exists() {
        return Err(WriteError::Other(anyhow::anyhow!(
            "目标文件已存在: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let layout = schema.layout(month)?.clone();
    let mut model = WorkbookModel::empty();
    let sheet = model.add_sheet(schema.sheet_name(month));
    write_inventory_headers(sheet, schema, &layout);
    model.save(path)?;
    info!(file = %path.display(), "新建库存账本");
    Ok(())
}

/// 清空数据区内的全部可写列
fn clear_writable_region(sheet: &mut SheetModel, layout: &SheetLayout) {
    let writable = layout.writable_cols();
    for row in layout.data_start_row..=layout.data_end_row {
        for &col in &writable {
            sheet.clear(row, col);
        }
    }
}

/// 按结构在表头行写列名
fn write_inventory_headers(sheet: &mut SheetModel, schema: &DocumentSchema, layout: &SheetLayout) {
    let header_row = layout.data_start_row.saturating_sub(1).max(1);
    for (i, col) in schema.identity_cols.iter().enumerate() {
        let name = schema
            .identity_fields
            .get(i)
            .map(|f| title_case(f))
            .unwrap_or_default();
        sheet.set(header_row, *col, CellContent::Text(name));
    }
    if let Some(col) = schema.note_col {
        sheet.set(header_row, col, CellContent::Text("Note".into()));
    }
    if let Some(col) = schema.status_col {
        sheet.set(header_row, col, CellContent::Text("Status".into()));
    }
    sheet.set(header_row, schema.cost_col, CellContent::Text("Cost".into()));
    for (name, col) in &schema.price_cols {
        sheet.set(header_row, *col, CellContent::Text(title_case(name)));
    }
    sheet.set(
        header_row,
        layout.initial_stock_col,
        CellContent::Text("Initial Stock".into()),
    );
    sheet.set(
        header_row,
        layout.added_stock_col,
        CellContent::Text("Add Stock".into()),
    );
    for day in 1..=31u32 {
        let col = layout.daily_start_col + day - 1;
        sheet.set(header_row, col, CellContent::Number(day as f64));
    }

    // 汇率单元格左侧写标签, 汇率值本身留给人工维护
    match &layout.rate_cells {
        RateCells::Single { row, col } if *col > 1 => {
            sheet.set(*row, *col - 1, CellContent::Text("Rate".into()));
        }
        RateCells::Single { .. } => {}
        RateCells::CashMukuru { cash, mukuru } => {
            if cash.1 > 1 {
                sheet.set(cash.0, cash.1 - 1, CellContent::Text("Cash Rate".into()));
            }
            if mukuru.1 > 1 {
                sheet.set(mukuru.0, mukuru.1 - 1, CellContent::Text("Mukuru Rate".into()));
            }
        }
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
