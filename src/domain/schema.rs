// ==========================================
// 门店账本同步引擎 - 文档结构定义
// ==========================================
// 依据: 历史 Excel 账本的两代列布局（旧版 8/9/10 月, 新版其余月份）
// 红线: 公式列集合与可写列集合必须互斥, 引擎永不覆盖公式列
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// 月份表名后缀（中文"月"字）
pub const MONTH_GLYPH: char = '\u{6708}'; // 月

// ==========================================
// LayoutError - 布局解析错误
// ==========================================
/// 布局层错误类型
///
/// 日列越界属于调用方契约违规, 必须硬失败, 不允许静默回退。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("天数越界: 必须在 1-31 之间, 实际 {0}")]
    DayOutOfRange(u32),

    #[error("月份越界: 必须在 1-12 之间, 实际 {0}")]
    MonthOutOfRange(u32),
}

// ==========================================
// ProductLine - 产品线
// ==========================================
/// 产品线标识（轮胎 / 手机）
///
/// 两条产品线共用同一个泛型引擎, 仅通过 DocumentSchema 的取值区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductLine {
    Tyre,
    Phone,
}

// ==========================================
// RateCells - 汇率单元格位置
// ==========================================
/// 汇率单元格位置（按布局代际不同）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateCells {
    /// 单一汇率单元格（轮胎库存表: 新版 I54 / 旧版 M2）
    Single { row: u32, col: u32 },
    /// 现金 + Mukuru 双汇率（手机库存表: B2 / B3）
    CashMukuru { cash: (u32, u32), mukuru: (u32, u32) },
}

// ==========================================
// SheetLayout - 库存表列布局描述符
// ==========================================
/// 库存表的一个版本化列布局
///
/// 所有列号与行号均为 1 起始, 与账本中的 Excel 坐标一致。
/// formula_cols 中的列由表格自身公式派生, 引擎只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub data_start_row: u32,
    pub data_end_row: u32,
    pub initial_stock_col: u32,
    pub added_stock_col: u32,
    /// 日销售区块起始列（第 1 天）
    pub daily_start_col: u32,
    /// 日销售区块结束列（第 31 天）
    pub daily_end_col: u32,
    pub rate_cells: RateCells,
    /// 公式列集合 - 永不写入
    pub formula_cols: BTreeSet<u32>,
}

impl SheetLayout {
    /// 天数（1-31）换算为日销售列号
    ///
    /// 越界视为调用方契约违规, 返回 LayoutError 而非静默取默认值。
    pub fn day_column(&self, day: u32) -> Result<u32, LayoutError> {
        if !(1..=31).contains(&day) {
            return Err(LayoutError::DayOutOfRange(day));
        }
        Ok(self.daily_start_col + day - 1)
    }

    /// 可写列集合（期初/入库/31 个日列）
    pub fn writable_cols(&self) -> BTreeSet<u32> {
        let mut cols: BTreeSet<u32> =
            (self.daily_start_col..=self.daily_end_col).collect();
        cols.insert(self.initial_stock_col);
        cols.insert(self.added_stock_col);
        cols
    }
}

// ==========================================
// InvoiceSchema - 发票工作簿结构（新版代际）
// ==========================================
/// 新版发票工作簿的表名与列映射
///
/// identity 列映射与 DocumentSchema::identity_fields 按下标对齐,
/// None 表示该身份属性在此表中不存在（如旧轮胎发票缺 pattern 列）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSchema {
    pub sales_sheet: String,
    pub payments_sheet: String,
    pub loss_sheet: String,
    pub stats_sheet: String,
    pub broken_sheet: String,

    // Sales Record 列（1 起始）
    pub sales_identity_cols: Vec<Option<u32>>,
    pub sales_date_col: u32,
    pub sales_qty_col: u32,
    pub sales_price_col: u32,
    pub sales_discount_col: u32,
    pub sales_total_col: u32,
    pub sales_payment_col: u32,
    pub sales_customer_col: u32,
    pub sales_data_start_row: u32,

    // Payment Record 列
    pub pay_date_col: u32,
    pub pay_customer_col: u32,
    pub pay_method_col: u32,
    pub pay_amount_col: u32,
    pub pay_data_start_row: u32,

    // Loss 表列（两条产品线结构一致, 仅 identity 对齐不同）
    pub loss_identity_cols: Vec<Option<u32>>,
    pub loss_data_start_row: u32,

    // Statistic 表汇率单元格（I2 = Mukuru, I3 = Cash）
    pub stats_mukuru_cell: (u32, u32),
    pub stats_cash_cell: (u32, u32),

    /// Sales Record 表头（建新文件用, 按列序排列）
    pub sales_headers: Vec<String>,
    /// Payment Record 表头
    pub payment_headers: Vec<String>,
    /// Loss 表头
    pub loss_headers: Vec<String>,
}

// ==========================================
// OldInvoiceSchema - 发票工作簿结构（旧版代际）
// ==========================================
/// 旧版发票: 销售按支付方式拆分为独立表（Cash / Mukuru）,
/// 每张表尾部嵌一段付款子账, 以字面量 "Date" 表头行为分界。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldInvoiceSheet {
    pub sheet: String,
    /// 该表固有的支付方式（表名即方式）
    pub payment_method: String,
    pub identity_cols: Vec<Option<u32>>,
    pub date_col: u32,
    pub qty_col: u32,
    pub price_col: u32,
    pub total_col: u32,
    pub customer_col: u32,
    /// 折扣寄存在 Note 列（如 -0.05 = 九五折）, Mukuru 表无此列
    pub note_col: Option<u32>,
    pub data_start_row: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldInvoiceSchema {
    pub sheets: Vec<OldInvoiceSheet>,
    // 付款子账列（A=日期, B=客户, D=金额）
    pub pay_date_col: u32,
    pub pay_customer_col: u32,
    pub pay_amount_col: u32,
}

// ==========================================
// DocumentSchema - 文档结构值对象
// ==========================================
/// 一条产品线的完整文档结构描述
///
/// # 职责
/// 1. 月份 → 表名（含"月"字后缀的固定命名约定）
/// 2. 月份 → 列布局（旧版月份集合固定为 {8, 9, 10}）
/// 3. 库存/发票/日销售三类文档的列映射
/// 4. 身份属性定义与模糊匹配参数（主键字段、别名表、尺寸修复开关）
///
/// # 红线
/// - 引擎内不允许出现按产品线分叉的代码路径, 差异全部收敛到本结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub line: ProductLine,
    /// 库存表名前缀（轮胎: "Tyre List_", 手机: 空）
    pub sheet_prefix: String,

    // ===== 身份属性 =====
    pub identity_fields: Vec<String>,
    /// 主键字段下标（轮胎: [size], 手机: [brand, model]）
    pub primary_fields: Vec<usize>,
    /// 需要尺寸分隔符修复的字段下标（仅轮胎 size）
    pub size_repair_field: Option<usize>,
    /// 次属性别名表（发票用语 → 库存表用语）
    pub secondary_aliases: Vec<(String, String)>,

    // ===== 库存表读取列 =====
    pub identity_cols: Vec<u32>,
    pub note_col: Option<u32>,
    pub status_col: Option<u32>,
    pub cost_col: u32,
    /// 价格列（名称, 列号）; 公式派生列以缓存值读取
    pub price_cols: Vec<(String, u32)>,
    /// 汇总行标签（小写比较）, 命中即跳过
    pub summary_labels: Vec<String>,
    /// 首身份列包含这些子串的行跳过（如手机表的 "return policy" 说明行）
    pub skip_substrings: Vec<String>,

    // ===== 布局版本 =====
    pub new_layout: SheetLayout,
    /// 旧版布局（手机线无历史旧版, 取 None）
    pub old_layout: Option<SheetLayout>,
    pub old_layout_months: BTreeSet<u32>,

    // ===== 发票结构 =====
    pub invoice: InvoiceSchema,
    pub old_invoice: Option<OldInvoiceSchema>,
}

impl DocumentSchema {
    /// 月份对应的库存表名, 如 "Tyre List_9月" / "9月"
    pub fn sheet_name(&self, month: u32) -> String {
        format!("{}{}{}", self.sheet_prefix, month, MONTH_GLYPH)
    }

    /// 解析月份对应的列布局
    ///
    /// 纯函数, 对 1-12 全定义; 旧版月份集合命中时返回旧布局。
    pub fn layout(&self, month: u32) -> Result<&SheetLayout, LayoutError> {
        if !(1..=12).contains(&month) {
            return Err(LayoutError::MonthOutOfRange(month));
        }
        if self.old_layout_months.contains(&month) {
            if let Some(old) = &self.old_layout {
                return Ok(old);
            }
        }
        Ok(&self.new_layout)
    }

    // ==========================================
    // 轮胎产品线结构
    // ==========================================
    // 公式列: G=成本换算, H=库存量, I=建议价, J=I/450/7, K=累计售出
    // 新版: M=期初 N=入库 O..AS=日销售, 汇率 I54
    // 旧版(8/9/10月): N=期初 O=入库 P..AT=日销售, 汇率 M2
    pub fn tyre() -> Self {
        let formula_cols: BTreeSet<u32> = [7, 8, 9, 10, 11].into_iter().collect();
        let new_layout = SheetLayout {
            data_start_row: 2,
            data_end_row: 51,
            initial_stock_col: 13,
            added_stock_col: 14,
            daily_start_col: 15,
            daily_end_col: 45,
            rate_cells: RateCells::Single { row: 54, col: 9 },
            formula_cols: formula_cols.clone(),
        };
        let old_layout = SheetLayout {
            data_start_row: 2,
            data_end_row: 51,
            initial_stock_col: 14,
            added_stock_col: 15,
            daily_start_col: 16,
            daily_end_col: 46,
            rate_cells: RateCells::Single { row: 2, col: 13 },
            formula_cols,
        };

        DocumentSchema {
            line: ProductLine::Tyre,
            sheet_prefix: "Tyre List_".to_string(),
            identity_fields: vec![
                "size".to_string(),
                "type".to_string(),
                "brand".to_string(),
                "pattern".to_string(),
            ],
            primary_fields: vec![0],
            size_repair_field: Some(0),
            secondary_aliases: vec![
                ("secondhand".to_string(), "second hand".to_string()),
                ("brandless".to_string(), "new but brandless".to_string()),
            ],
            identity_cols: vec![1, 2, 3, 4],
            note_col: Some(5), // E = LI/SR
            status_col: None,
            cost_col: 6,
            price_cols: vec![
                ("original".to_string(), 12),
                ("suggested".to_string(), 9),
            ],
            summary_labels: vec![
                "total".to_string(),
                "total tyre available".to_string(),
            ],
            skip_substrings: vec![],
            new_layout,
            old_layout: Some(old_layout),
            old_layout_months: [8, 9, 10].into_iter().collect(),
            invoice: InvoiceSchema {
                sales_sheet: "Sales Record".to_string(),
                payments_sheet: "Payment Record".to_string(),
                loss_sheet: "Loss".to_string(),
                stats_sheet: "Statistic".to_string(),
                broken_sheet: "Broken Stock".to_string(),
                // A=日期 B=品牌 C=类别 D=尺寸 E=数量 F=单价 G=折扣 H=合计(公式) I=支付 J=客户
                sales_identity_cols: vec![Some(4), Some(3), Some(2), None],
                sales_date_col: 1,
                sales_qty_col: 5,
                sales_price_col: 6,
                sales_discount_col: 7,
                sales_total_col: 8,
                sales_payment_col: 9,
                sales_customer_col: 10,
                sales_data_start_row: 2,
                pay_date_col: 1,
                pay_customer_col: 2,
                pay_method_col: 3,
                pay_amount_col: 4,
                pay_data_start_row: 2,
                // Loss: A=日期 B=品牌 C=型号 D=规格 E=数量 ...
                loss_identity_cols: vec![Some(4), Some(3), Some(2), None],
                loss_data_start_row: 3,
                stats_mukuru_cell: (2, 9),
                stats_cash_cell: (3, 9),
                sales_headers: vec![
                    "Date".into(), "Brand".into(), "Type".into(), "Size".into(),
                    "Qty".into(), "Unit Price".into(), "Discount".into(),
                    "Total".into(), "Payment Method".into(), "Customer Name".into(),
                ],
                payment_headers: vec![
                    "Date".into(), "Customer".into(),
                    "Payment Method".into(), "MWK".into(),
                ],
                loss_headers: vec![
                    "Date".into(), "Brand".into(), "Model".into(), "Config".into(),
                    "Qty".into(), "Exchanged".into(), "Refund per pc".into(),
                    "Total Refund".into(), "Note".into(),
                ],
            },
            old_invoice: Some(OldInvoiceSchema {
                sheets: vec![
                    OldInvoiceSheet {
                        sheet: "Cash".to_string(),
                        payment_method: "Cash".to_string(),
                        // A=日期 B=尺寸 C=类别 D=品牌 E=数量 F=单价 G=合计 H=备注 I=客户
                        identity_cols: vec![Some(2), Some(3), Some(4), None],
                        date_col: 1,
                        qty_col: 5,
                        price_col: 6,
                        total_col: 7,
                        customer_col: 9,
                        note_col: Some(8),
                        data_start_row: 3,
                    },
                    OldInvoiceSheet {
                        sheet: "Mukuru".to_string(),
                        payment_method: "Mukuru".to_string(),
                        // A=日期 B=品牌 C=型号 D=规格 E=数量 F=单价 G=合计 H=客户
                        identity_cols: vec![Some(4), Some(3), Some(2), None],
                        date_col: 1,
                        qty_col: 5,
                        price_col: 6,
                        total_col: 7,
                        customer_col: 8,
                        note_col: None,
                        data_start_row: 3,
                    },
                ],
                pay_date_col: 1,
                pay_customer_col: 2,
                pay_amount_col: 4,
            }),
        }
    }

    // ==========================================
    // 手机产品线结构
    // ==========================================
    // 表名无前缀("1月".."12月"), 第 4 行表头, 第 5 行起数据
    // 公式列: E=剩余量, G=RMB, H=现金价, I=Mukuru价, J=线上价
    pub fn phone() -> Self {
        let formula_cols: BTreeSet<u32> = [5, 7, 8, 9, 10].into_iter().collect();
        let layout = SheetLayout {
            data_start_row: 5,
            data_end_row: 100,
            initial_stock_col: 13,
            added_stock_col: 14,
            daily_start_col: 15,
            daily_end_col: 45,
            rate_cells: RateCells::CashMukuru {
                cash: (2, 2),
                mukuru: (3, 2),
            },
            formula_cols,
        };

        DocumentSchema {
            line: ProductLine::Phone,
            sheet_prefix: String::new(),
            identity_fields: vec![
                "brand".to_string(),
                "model".to_string(),
                "config".to_string(),
            ],
            primary_fields: vec![0, 1],
            size_repair_field: None,
            secondary_aliases: vec![],
            identity_cols: vec![1, 2, 3],
            note_col: Some(4),
            status_col: Some(11),
            cost_col: 6,
            price_cols: vec![
                ("cash".to_string(), 8),
                ("mukuru".to_string(), 9),
                ("online".to_string(), 10),
            ],
            summary_labels: vec!["total".to_string(), "grand total".to_string()],
            skip_substrings: vec!["return policy".to_string()],
            new_layout: layout,
            old_layout: None,
            old_layout_months: BTreeSet::new(),
            invoice: InvoiceSchema {
                sales_sheet: "Sales Record".to_string(),
                payments_sheet: "Payment Record".to_string(),
                loss_sheet: "Loss".to_string(),
                stats_sheet: "Statistic".to_string(),
                broken_sheet: "Broken Stock".to_string(),
                // A=日期 B=品牌 C=型号 D=规格 E=数量 F=单价 G=折扣 H=合计 I=支付 J=客户
                sales_identity_cols: vec![Some(2), Some(3), Some(4)],
                sales_date_col: 1,
                sales_qty_col: 5,
                sales_price_col: 6,
                sales_discount_col: 7,
                sales_total_col: 8,
                sales_payment_col: 9,
                sales_customer_col: 10,
                sales_data_start_row: 2,
                pay_date_col: 1,
                pay_customer_col: 2,
                pay_method_col: 3,
                pay_amount_col: 4,
                pay_data_start_row: 2,
                loss_identity_cols: vec![Some(2), Some(3), Some(4)],
                loss_data_start_row: 3,
                stats_mukuru_cell: (2, 9),
                stats_cash_cell: (3, 9),
                sales_headers: vec![
                    "Date".into(), "Brand".into(), "Model".into(), "Config".into(),
                    "Qty".into(), "Unit Price".into(), "Discount".into(),
                    "Total".into(), "Payment Method".into(), "Customer Name".into(),
                ],
                payment_headers: vec![
                    "Date".into(), "Customer".into(),
                    "Payment Method".into(), "MWK".into(),
                ],
                loss_headers: vec![
                    "Date".into(), "Brand".into(), "Model".into(), "Config".into(),
                    "Qty".into(), "Exchanged".into(), "Refund per pc".into(),
                    "Total Refund".into(), "Note".into(),
                ],
            },
            old_invoice: None,
        }
    }
}
