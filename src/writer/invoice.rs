// ==========================================
// 门店账本同步引擎 - 发票写出
// ==========================================
// 只支持新版代际（单一 Sales Record / Payment Record）。
// 全量重写: 表头行以下整体清空后重写快照; 合计列写公式而非数值,
// 保持与手工维护的发票文件一致的计算口径。
// ==========================================

use crate::config::EngineConfig;
use crate::domain::record::{PaymentExport, SaleExport};
use crate::domain::schema::{DocumentSchema, InvoiceSchema};
use crate::writer::backup::create_backup;
use crate::writer::workbook::{CellContent, SheetModel, WorkbookModel};
use crate::writer::WriteError;
use std::path::Path;
use tracing::{debug, info};

/// 1 起始列号 → Excel 列字母（1 = A, 27 = AA）
fn col_letter(col: u32) -> String {
    let mut col = col;
    let mut letters = String::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.insert(0, (b'A' + rem) as char);
        col = (col - 1) / 26;
    }
    letters
}

// ==========================================
// 批量导出
// ==========================================
/// 把销售与付款记录批量写入发票文件
///
/// 文件不存在时按结构新建; 存在时先备份再全量重写。
///
/// # 返回
/// - (写入销售行数, 写入付款行数)
pub fn export_invoice_batch(
    path: &Path,
    schema: &DocumentSchema,
    sales: &[SaleExport],
    payments: &[PaymentExport],
    config: &EngineConfig,
) -> Result<(usize, usize), WriteError> {
    let inv = &schema.invoice;

    let mut model = if path.exists() {
        create_backup(path, config)?;
        WorkbookModel::load(path)?
    } else {
        debug!(file = %path.display(), "发票文件不存在, 按结构新建");
        new_invoice_model(inv)
    };
    for name in [&inv.sales_sheet, &inv.payments_sheet] {
        if !model.has_sheet(name) {
            return Err(WriteError::SheetMissing(name.clone()));
        }
    }

    // ===== Sales Record =====
    let qty_letter = col_letter(inv.sales_qty_col);
    let price_letter = col_letter(inv.sales_price_col);
    let discount_letter = col_letter(inv.sales_discount_col);

    let sheet = model.sheet_mut(&inv.sales_sheet)?;
    sheet.clear_rows_from(inv.sales_data_start_row);
    for (i, sale) in sales.iter().enumerate() {
        let row = inv.sales_data_start_row + i as u32;
        if let Some(date) = sale.date {
            sheet.set(row, inv.sales_date_col, CellContent::Date(date));
        }
        for (field, col) in inv.sales_identity_cols.iter().enumerate() {
            let (Some(col), Some(Some(value))) = (col, sale.identity.get(field)) else {
                continue;
            };
            sheet.set(row, *col, CellContent::Text(value.clone()));
        }
        sheet.set(row, inv.sales_qty_col, CellContent::Number(sale.qty as f64));
        sheet.set(
            row,
            inv.sales_price_col,
            CellContent::Number(sale.unit_price),
        );
        sheet.set(
            row,
            inv.sales_discount_col,
            CellContent::Number(sale.discount),
        );
        sheet.set(
            row,
            inv.sales_total_col,
            CellContent::Formula(format!(
                "={qty}{row}*{price}{row}*(1-{disc}{row})",
                qty = qty_letter,
                price = price_letter,
                disc = discount_letter,
            )),
        );
        if let Some(method) = &sale.payment_method {
            sheet.set(row, inv.sales_payment_col, CellContent::Text(method.clone()));
        }
        if let Some(customer) = &sale.customer_name {
            sheet.set(
                row,
                inv.sales_customer_col,
                CellContent::Text(customer.clone()),
            );
        }
    }

    // ===== Payment Record =====
    let sheet = model.sheet_mut(&inv.payments_sheet)?;
    sheet.clear_rows_from(inv.pay_data_start_row);
    for (i, pay) in payments.iter().enumerate() {
        let row = inv.pay_data_start_row + i as u32;
        if let Some(date) = pay.date {
            sheet.set(row, inv.pay_date_col, CellContent::Date(date));
        }
        if let Some(customer) = &pay.customer {
            sheet.set(row, inv.pay_customer_col, CellContent::Text(customer.clone()));
        }
        if let Some(method) = &pay.payment_method {
            sheet.set(row, inv.pay_method_col, CellContent::Text(method.clone()));
        }
        sheet.set(row, inv.pay_amount_col, CellContent::Number(pay.amount_mwk));
    }

    model.save(path)?;
    info!(
        file = %path.display(),
        sales = sales.len(),
        payments = payments.len(),
        "发票批量写出完成"
    );
    Ok((sales.len(), payments.len()))
}

/// 新建发票文件（目标路径不允许已存在）
pub fn create_invoice_file(path: &Path, schema: &DocumentSchema) -> Result<(), WriteError> {
    if path.exists() {
        return Err(WriteError::Other(anyhow::anyhow!(
            "目标文件已存在: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let model = new_invoice_model(&schema.invoice);
    model.save(path)?;
    info!(file = %path.display(), "新建发票文件");
    Ok(())
}

/// 按结构生成五张表的空发票模型
fn new_invoice_model(inv: &InvoiceSchema) -> WorkbookModel {
    let mut model = WorkbookModel::empty();

    let sheet = model.add_sheet(&inv.sales_sheet);
    write_header_row(sheet, inv.sales_data_start_row.saturating_sub(1).max(1), &inv.sales_headers);

    let sheet = model.add_sheet(&inv.payments_sheet);
    write_header_row(sheet, inv.pay_data_start_row.saturating_sub(1).max(1), &inv.payment_headers);

    let sheet = model.add_sheet(&inv.loss_sheet);
    sheet.set(1, 1, CellContent::Text(inv.loss_sheet.clone()));
    write_header_row(sheet, inv.loss_data_start_row.saturating_sub(1).max(1), &inv.loss_headers);

    let sheet = model.add_sheet(&inv.stats_sheet);
    sheet.set(1, 1, CellContent::Text(inv.stats_sheet.clone()));
    let (m_row, m_col) = inv.stats_mukuru_cell;
    let (c_row, c_col) = inv.stats_cash_cell;
    sheet.set(m_row, m_col.saturating_sub(1).max(1), CellContent::Text("Mukuru Rate".into()));
    sheet.set(c_row, c_col.saturating_sub(1).max(1), CellContent::Text("Cash Rate".into()));

    model.add_sheet(&inv.broken_sheet);
    model
}

fn write_header_row(sheet: &mut SheetModel, row: u32, headers: &[String]) {
    for (i, header) in headers.iter().enumerate() {
        sheet.set(row, i as u32 + 1, CellContent::Text(header.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::DocumentSchema;
    use chrono::NaiveDate;

    #[test]
    fn test_col_letter() {
        assert_eq!(col_letter(1), "A");
        assert_eq!(col_letter(8), "H");
        assert_eq!(col_letter(26), "Z");
        assert_eq!(col_letter(27), "AA");
        assert_eq!(col_letter(45), "AS");
    }

    #[test]
    fn test_new_invoice_model_has_all_sheets() {
        let schema = DocumentSchema::tyre();
        let model = new_invoice_model(&schema.invoice);
        for name in [
            "Sales Record",
            "Payment Record",
            "Loss",
            "Statistic",
            "Broken Stock",
        ] {
            assert!(model.has_sheet(name), "缺表: {name}");
        }
        let sales = model.sheet("Sales Record").unwrap();
        assert_eq!(sales.get(1, 1), Some(&CellContent::Text("Date".into())));
        assert_eq!(sales.get(1, 8), Some(&CellContent::Text("Total".into())));
    }

    #[test]
    fn test_export_roundtrip_in_model() {
        // 不落盘, 直接验证模型写入口径
        let schema = DocumentSchema::phone();
        let inv = &schema.invoice;
        let mut model = new_invoice_model(inv);

        let sale = SaleExport {
            date: NaiveDate::from_ymd_opt(2025, 3, 8),
            identity: vec![
                Some("Samsung".into()),
                Some("A16".into()),
                Some("4+128".into()),
            ],
            qty: 2,
            unit_price: 185000.0,
            discount: 0.05,
            payment_method: Some("Mukuru".into()),
            customer_name: Some("Chisomo".into()),
        };
        let sheet = model.sheet_mut(&inv.sales_sheet).unwrap();
        let row = inv.sales_data_start_row;
        sheet.set(row, inv.sales_date_col, CellContent::Date(sale.date.unwrap()));
        sheet.set(
            row,
            inv.sales_total_col,
            CellContent::Formula(format!("=E{row}*F{row}*(1-G{row})")),
        );
        assert_eq!(
            sheet.get(row, inv.sales_total_col),
            Some(&CellContent::Formula("=E2*F2*(1-G2)".into()))
        );
    }
}
