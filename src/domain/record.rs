// ==========================================
// 门店账本同步引擎 - 文档记录模型
// ==========================================
// 读取层输出的纯数据记录, 宽松读入（空值/坏值取默认）,
// 写出层与编排层再做严格校验
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ProductRow - 库存表一行产品
// ==========================================
/// 库存表中的一行产品记录
///
/// identity 与 DocumentSchema::identity_fields 按下标对齐;
/// daily_sales 为稀疏 天→数量 映射, 零值与空单元格省略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    /// 源行号（1 起始）
    pub row: u32,
    pub identity: Vec<Option<String>>,
    /// 附注列（轮胎: LI/SR, 手机: 备注）
    pub note: Option<String>,
    /// 状态列（仅手机表有）
    pub status: Option<String>,
    pub cost: f64,
    /// 价格字段（名称 → 缓存值, 公式列以只读缓存值读入）
    pub prices: BTreeMap<String, f64>,
    pub initial_stock: i64,
    pub added_stock: i64,
    pub daily_sales: BTreeMap<u32, i64>,
}

// ==========================================
// ExchangeRates - 汇率
// ==========================================
/// 汇率记录; 单汇率布局下两个字段取同一值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub cash_rate: f64,
    pub mukuru_rate: f64,
}

// ==========================================
// SaleRow / PaymentRow / LossRow - 发票记录
// ==========================================
/// 发票/日销售文件中的一行销售记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRow {
    pub date: Option<NaiveDate>,
    pub identity: Vec<Option<String>>,
    pub qty: i64,
    pub unit_price: f64,
    /// 原值读入: 新版为百分数或小数, 旧版为 Note 列小数的绝对值
    pub discount: f64,
    pub total: f64,
    pub payment_method: Option<String>,
    pub customer_name: Option<String>,
}

/// 付款记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub date: Option<NaiveDate>,
    pub customer: Option<String>,
    pub payment_method: Option<String>,
    pub amount_mwk: f64,
}

/// 损耗记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRow {
    pub date: Option<NaiveDate>,
    pub identity: Vec<Option<String>>,
    pub qty: i64,
    pub cost: f64,
    /// 是否已换货（原表为自由文本, 此处保留原文）
    pub exchanged: Option<String>,
    pub refund: f64,
    pub total_refund: f64,
    pub customer: Option<String>,
    pub note: Option<String>,
}

// ==========================================
// InvoiceGeneration - 发票文件代际
// ==========================================
/// 发票文件代际: 新版单一销售表 / 旧版按支付方式拆表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceGeneration {
    New,
    Old,
}

// ==========================================
// 聚合读取结果（按文档种类打标签）
// ==========================================
/// 发票文件的完整读取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub generation: InvoiceGeneration,
    pub sales: Vec<SaleRow>,
    pub payments: Vec<PaymentRow>,
    pub losses: Vec<LossRow>,
    pub rates: ExchangeRates,
}

/// 日销售文件的读取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyData {
    pub sales: Vec<SaleRow>,
    pub payments: Vec<PaymentRow>,
}

/// 库存文件的读取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryData {
    pub rows: Vec<ProductRow>,
    pub rates: ExchangeRates,
}

// ==========================================
// 导出方向的输入记录
// ==========================================
/// 一个产品的库存水平（导出输入, entity 为外部目录实体引用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub entity: crate::domain::catalog::EntityId,
    pub initial_stock: i64,
    pub added_stock: i64,
}

/// 某一天某个产品的售出数量（导出输入）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayQty {
    pub entity: crate::domain::catalog::EntityId,
    pub qty: i64,
}

/// 发票导出的一行销售
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleExport {
    pub date: Option<NaiveDate>,
    pub identity: Vec<Option<String>>,
    pub qty: i64,
    pub unit_price: f64,
    /// 折扣小数（0.05 = 5%）, 写入后由表内公式计算合计
    pub discount: f64,
    pub payment_method: Option<String>,
    pub customer_name: Option<String>,
}

/// 发票导出的一行付款
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentExport {
    pub date: Option<NaiveDate>,
    pub customer: Option<String>,
    pub payment_method: Option<String>,
    pub amount_mwk: f64,
}
