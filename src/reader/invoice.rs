// ==========================================
// 门店账本同步引擎 - 发票读取
// ==========================================
// 两代文件格式:
// - 新版: 单一 "Sales Record" 销售表 + "Payment Record" 付款表
// - 旧版: 销售按支付方式拆成 Cash/Mukuru 两张表, 每张表尾部
//   嵌一段付款子账, 以字面量 "Date" 表头行为分界
// 识别规则: 有新版销售表 → 新版; 有任一旧版表 → 旧版; 都没有 → 硬失败
// ==========================================

use crate::domain::record::{
    ExchangeRates, InvoiceData, InvoiceGeneration, LossRow, PaymentRow, SaleRow,
};
use crate::domain::schema::{DocumentSchema, OldInvoiceSchema, OldInvoiceSheet};
use crate::reader::{cell, workbook, ReadError};
use calamine::{Data, Range, Reader};
use std::path::Path;
use tracing::{debug, warn};

/// 销售区日期列里的汇总行标签（小写比较）
const SALES_SUMMARY_LABELS: [&str; 5] = [
    "total",
    "totals",
    "total quantity",
    "total price",
    "total price (mkw)",
];

// Loss 表固定列（两条产品线一致）
const LOSS_DATE_COL: u32 = 1;
const LOSS_QTY_COL: u32 = 5;
const LOSS_COST_COL: u32 = 6;
const LOSS_EXCHANGED_COL: u32 = 7;
const LOSS_REFUND_COL: u32 = 8;
const LOSS_TOTAL_REFUND_COL: u32 = 9;
const LOSS_CUSTOMER_COL: u32 = 10;
const LOSS_NOTE_COL: u32 = 11;

/// 识别发票文件代际
pub fn detect_generation(
    path: &Path,
    schema: &DocumentSchema,
) -> Result<InvoiceGeneration, ReadError> {
    let wb = workbook::open(path)?;
    let available = wb.sheet_names().to_vec();

    if available.iter().any(|n| n == &schema.invoice.sales_sheet) {
        return Ok(InvoiceGeneration::New);
    }
    if let Some(old) = &schema.old_invoice {
        if old
            .sheets
            .iter()
            .any(|s| available.iter().any(|n| n == &s.sheet))
        {
            return Ok(InvoiceGeneration::Old);
        }
    }
    Err(ReadError::UnknownInvoiceFormat {
        available,
        new_sheet: schema.invoice.sales_sheet.clone(),
        old_sheets: schema
            .old_invoice
            .iter()
            .flat_map(|o| o.sheets.iter().map(|s| s.sheet.clone()))
            .collect(),
    })
}

/// 读取发票文件的全部区块（销售/付款/损耗/汇率）
pub fn read_invoice(path: &Path, schema: &DocumentSchema) -> Result<InvoiceData, ReadError> {
    let generation = detect_generation(path, schema)?;
    let mut wb = workbook::open(path)?;

    let (sales, payments) = match generation {
        InvoiceGeneration::New => {
            let sales_range = workbook::range(&mut wb, &schema.invoice.sales_sheet)?;
            let sales = read_sales_rows(&sales_range, schema, schema.invoice.sales_data_start_row);
            let payments = match workbook::range(&mut wb, &schema.invoice.payments_sheet) {
                Ok(range) => read_payment_rows(&range, schema),
                Err(ReadError::SheetMissing { sheet, .. }) => {
                    warn!(表 = %sheet, "付款表缺失, 按空付款处理");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            (sales, payments)
        }
        InvoiceGeneration::Old => {
            let old = schema
                .old_invoice
                .as_ref()
                .expect("detect_generation 已保证旧版结构存在");
            let mut sales = Vec::new();
            let mut payments = Vec::new();
            for sheet in &old.sheets {
                let range = match workbook::range(&mut wb, &sheet.sheet) {
                    Ok(range) => range,
                    Err(ReadError::SheetMissing { .. }) => continue,
                    Err(e) => return Err(e),
                };
                let (sheet_sales, pay_start) = read_old_sheet_sales(&range, sheet);
                sales.extend(sheet_sales);
                payments.extend(read_old_sheet_payments(&range, sheet, old, pay_start));
            }
            (sales, payments)
        }
    };

    // Loss 与 Statistic 两代结构一致; 老文件可能缺表, 宽松取默认
    let losses = match workbook::range(&mut wb, &schema.invoice.loss_sheet) {
        Ok(range) => read_loss_rows(&range, schema),
        Err(ReadError::SheetMissing { sheet, .. }) => {
            warn!(表 = %sheet, "损耗表缺失, 按无损耗处理");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    let rates = match workbook::range(&mut wb, &schema.invoice.stats_sheet) {
        Ok(range) => read_stats_rates(&range, schema),
        Err(ReadError::SheetMissing { sheet, .. }) => {
            warn!(表 = %sheet, "统计表缺失, 汇率取 0");
            ExchangeRates {
                cash_rate: 0.0,
                mukuru_rate: 0.0,
            }
        }
        Err(e) => return Err(e),
    };

    debug!(
        代际 = ?generation,
        销售 = sales.len(),
        付款 = payments.len(),
        损耗 = losses.len(),
        "发票读取完成"
    );
    Ok(InvoiceData {
        generation,
        sales,
        payments,
        losses,
        rates,
    })
}

/// 按 identity 列映射读出一行身份属性
fn read_identity(range: &Range<Data>, row: u32, cols: &[Option<u32>]) -> Vec<Option<String>> {
    cols.iter()
        .map(|col| col.and_then(|c| cell::to_str(workbook::cell(range, row, c))))
        .collect()
}

fn is_summary_label(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|s| SALES_SUMMARY_LABELS.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// 新版销售表行读取（发票与日销售文件共用此列映射）
pub(crate) fn read_sales_rows(
    range: &Range<Data>,
    schema: &DocumentSchema,
    start_row: u32,
) -> Vec<SaleRow> {
    let inv = &schema.invoice;
    let mut sales = Vec::new();

    for row in start_row..=workbook::max_row(range) {
        let date_val = workbook::cell(range, row, inv.sales_date_col);
        let qty_val = workbook::cell(range, row, inv.sales_qty_col);
        if cell::is_empty(date_val) && cell::is_empty(qty_val) {
            continue;
        }

        let identity = read_identity(range, row, &inv.sales_identity_cols);
        // 首身份属性或日期列写着 Total 的是汇总行
        if is_summary_label(&identity[0]) {
            continue;
        }
        if is_summary_label(&cell::to_str(date_val)) {
            continue;
        }

        sales.push(SaleRow {
            date: cell::to_date(date_val),
            identity,
            qty: cell::to_i64(qty_val, 0),
            unit_price: cell::to_f64(workbook::cell(range, row, inv.sales_price_col), 0.0),
            discount: cell::to_f64(workbook::cell(range, row, inv.sales_discount_col), 0.0),
            total: cell::to_f64(workbook::cell(range, row, inv.sales_total_col), 0.0),
            payment_method: cell::to_str(workbook::cell(range, row, inv.sales_payment_col)),
            customer_name: cell::to_str(workbook::cell(range, row, inv.sales_customer_col)),
        });
    }
    sales
}

/// 新版付款表行读取
pub(crate) fn read_payment_rows(range: &Range<Data>, schema: &DocumentSchema) -> Vec<PaymentRow> {
    let inv = &schema.invoice;
    let mut payments = Vec::new();

    for row in inv.pay_data_start_row..=workbook::max_row(range) {
        let amount = workbook::cell(range, row, inv.pay_amount_col);
        if cell::is_empty(amount) {
            continue;
        }
        if is_summary_label(&cell::to_str(workbook::cell(range, row, inv.pay_date_col))) {
            continue;
        }

        payments.push(PaymentRow {
            date: cell::to_date(workbook::cell(range, row, inv.pay_date_col)),
            customer: cell::to_str(workbook::cell(range, row, inv.pay_customer_col)),
            payment_method: cell::to_str(workbook::cell(range, row, inv.pay_method_col)),
            amount_mwk: cell::to_f64(amount, 0.0),
        });
    }
    payments
}

/// 旧版分表销售区读取
///
/// 返回 (销售行, 付款子账起始行)。扫描到日期列为字面量 "Date"
/// 的行即为付款子账表头, 销售区到此为止。
fn read_old_sheet_sales(range: &Range<Data>, sheet: &OldInvoiceSheet) -> (Vec<SaleRow>, u32) {
    let max_row = workbook::max_row(range);
    let mut sales = Vec::new();
    let mut payment_start = max_row + 1; // 缺省: 无付款子账

    for row in sheet.data_start_row..=max_row {
        let date_val = workbook::cell(range, row, sheet.date_col);
        let date_str = cell::to_str(date_val);

        // 付款子账分界: 日期列出现 "Date" 表头
        if date_str
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("date"))
            .unwrap_or(false)
        {
            payment_start = row + 1;
            break;
        }

        let qty_val = workbook::cell(range, row, sheet.qty_col);
        let identity = read_identity(range, row, &sheet.identity_cols);

        if cell::is_empty(qty_val) && identity[0].is_none() && cell::is_empty(date_val) {
            continue;
        }
        if is_summary_label(&identity[0]) || is_summary_label(&date_str) {
            continue;
        }

        // 旧版把折扣寄存在 Note 列（负小数, 如 -0.05 = 九五折）
        let discount = sheet
            .note_col
            .map(|col| cell::to_f64(workbook::cell(range, row, col), 0.0).abs())
            .unwrap_or(0.0);

        let qty = cell::to_i64(qty_val, 0);
        if identity[0].is_none() && qty == 0 {
            continue;
        }

        sales.push(SaleRow {
            date: cell::to_date(date_val),
            identity,
            qty,
            unit_price: cell::to_f64(workbook::cell(range, row, sheet.price_col), 0.0),
            discount,
            total: cell::to_f64(workbook::cell(range, row, sheet.total_col), 0.0),
            payment_method: Some(sheet.payment_method.clone()),
            customer_name: cell::to_str(workbook::cell(range, row, sheet.customer_col)),
        });
    }
    (sales, payment_start)
}

/// 旧版分表付款子账读取（金额非正或汇总行跳过）
fn read_old_sheet_payments(
    range: &Range<Data>,
    sheet: &OldInvoiceSheet,
    old: &OldInvoiceSchema,
    start_row: u32,
) -> Vec<PaymentRow> {
    let mut payments = Vec::new();

    for row in start_row..=workbook::max_row(range) {
        let amount = workbook::cell(range, row, old.pay_amount_col);
        if cell::is_empty(amount) {
            continue;
        }
        let date_val = workbook::cell(range, row, old.pay_date_col);
        if is_summary_label(&cell::to_str(date_val)) {
            continue;
        }
        let amount_f = cell::to_f64(amount, 0.0);
        if amount_f <= 0.0 {
            continue;
        }

        payments.push(PaymentRow {
            date: cell::to_date(date_val),
            customer: cell::to_str(workbook::cell(range, row, old.pay_customer_col)),
            payment_method: Some(sheet.payment_method.clone()),
            amount_mwk: amount_f,
        });
    }
    payments
}

/// Loss 表行读取（第 1 行大标题, 第 2 行表头, 第 3 行起数据）
fn read_loss_rows(range: &Range<Data>, schema: &DocumentSchema) -> Vec<LossRow> {
    let inv = &schema.invoice;
    let mut losses = Vec::new();

    for row in inv.loss_data_start_row..=workbook::max_row(range) {
        let qty = workbook::cell(range, row, LOSS_QTY_COL);
        if cell::is_empty(qty) {
            continue;
        }

        losses.push(LossRow {
            date: cell::to_date(workbook::cell(range, row, LOSS_DATE_COL)),
            identity: read_identity(range, row, &inv.loss_identity_cols),
            qty: cell::to_i64(qty, 0),
            cost: cell::to_f64(workbook::cell(range, row, LOSS_COST_COL), 0.0),
            exchanged: cell::to_str(workbook::cell(range, row, LOSS_EXCHANGED_COL)),
            refund: cell::to_f64(workbook::cell(range, row, LOSS_REFUND_COL), 0.0),
            total_refund: cell::to_f64(workbook::cell(range, row, LOSS_TOTAL_REFUND_COL), 0.0),
            customer: cell::to_str(workbook::cell(range, row, LOSS_CUSTOMER_COL)),
            note: cell::to_str(workbook::cell(range, row, LOSS_NOTE_COL)),
        });
    }
    losses
}

/// Statistic 表汇率读取（I2 = Mukuru, I3 = Cash）
fn read_stats_rates(range: &Range<Data>, schema: &DocumentSchema) -> ExchangeRates {
    let inv = &schema.invoice;
    ExchangeRates {
        mukuru_rate: cell::to_f64(
            workbook::cell(range, inv.stats_mukuru_cell.0, inv.stats_mukuru_cell.1),
            0.0,
        ),
        cash_rate: cell::to_f64(
            workbook::cell(range, inv.stats_cash_cell.0, inv.stats_cash_cell.1),
            0.0,
        ),
    }
}
