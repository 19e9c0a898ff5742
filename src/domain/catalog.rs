// ==========================================
// 门店账本同步引擎 - 目录领域模型
// ==========================================
// 目录实体的存储归外部服务层所有, 引擎只提议新建/更新,
// 本模块定义提议所用的纯数据类型与去重指纹
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// EntityId - 目录实体引用
// ==========================================
/// 目录实体引用（外部存储分配）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityId(pub i64);

// ==========================================
// CatalogEntity - 目录实体
// ==========================================
/// 一个轮胎或手机产品
///
/// identity 与对应 DocumentSchema::identity_fields 按下标对齐。
/// source_row 为该实体在库存表中的行号, 从未绑定过文档时为 None。
/// 引擎在导入时新建/更新实体, 从不删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: EntityId,
    pub identity: Vec<Option<String>>,
    pub cost: f64,
    pub prices: BTreeMap<String, f64>,
    pub source_row: Option<u32>,
}

// ==========================================
// PeriodRecord - 周期库存状态
// ==========================================
/// 一个实体在一个 (年, 月) 周期内的库存状态
///
/// 唯一性约束: 每个 (entity, year, month) 至多一条, 重复导入走更新。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub entity: EntityId,
    pub year: i32,
    pub month: u32,
    pub initial_stock: i64,
    pub added_stock: i64,
    pub daily_sales: BTreeMap<u32, i64>,
}

// ==========================================
// PaymentMethod - 支付方式
// ==========================================
/// 规范化后的支付方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Mukuru,
    Card,
}

impl PaymentMethod {
    /// 自由文本 → 支付方式, 缺省为现金
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return PaymentMethod::Cash;
        };
        let m = raw.trim().to_lowercase();
        if m.contains("mukuru") {
            PaymentMethod::Mukuru
        } else if m.contains("card") {
            PaymentMethod::Card
        } else {
            PaymentMethod::Cash
        }
    }
}

// ==========================================
// 交易记录（销售 / 付款 / 损耗）
// ==========================================
/// 导入产生的一笔销售交易提议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleTransaction {
    pub date: NaiveDate,
    pub entity: EntityId,
    pub qty: i64,
    pub unit_price: f64,
    /// 百分数口径（5 = 九五折）
    pub discount_pct: f64,
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
}

/// 导入产生的一笔付款交易提议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub date: NaiveDate,
    pub customer: String,
    pub payment_method: PaymentMethod,
    pub amount_mwk: f64,
}

/// 导入产生的一笔损耗记录提议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossTransaction {
    pub date: NaiveDate,
    pub entity: EntityId,
    pub qty: i64,
    pub cost: f64,
    pub exchanged: bool,
    pub refund: f64,
    pub total_refund: f64,
    pub note: Option<String>,
}

// ==========================================
// 去重指纹
// ==========================================
// 软去重启发式, 不是硬唯一约束: 指纹命中即跳过本条并计入警告

/// 销售去重指纹: (日期, 实体, 数量, 单价)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleFingerprint {
    pub date: NaiveDate,
    pub entity: EntityId,
    pub qty: i64,
    pub unit_price: f64,
}

impl SaleFingerprint {
    pub fn of(sale: &SaleTransaction) -> Self {
        SaleFingerprint {
            date: sale.date,
            entity: sale.entity,
            qty: sale.qty,
            unit_price: sale.unit_price,
        }
    }
}

/// 付款去重指纹: (日期, 客户, 金额)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFingerprint {
    pub date: NaiveDate,
    pub customer: String,
    pub amount_mwk: f64,
}

impl PaymentFingerprint {
    pub fn of(payment: &PaymentTransaction) -> Self {
        PaymentFingerprint {
            date: payment.date,
            customer: payment.customer.clone(),
            amount_mwk: payment.amount_mwk,
        }
    }
}
