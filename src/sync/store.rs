// ==========================================
// 门店账本同步引擎 - 目录存储接口
// ==========================================
// 引擎不拥有目录存储, 只通过本接口提议变更。调用方以任意后端
// 实现本接口; MemoryStore 是自带的内存实现, 供测试与演练使用。
// ==========================================

use crate::domain::catalog::{
    CatalogEntity, EntityId, LossTransaction, PaymentFingerprint, PaymentTransaction,
    PeriodRecord, SaleFingerprint, SaleTransaction,
};
use crate::domain::record::ExchangeRates;
use std::collections::BTreeMap;
use thiserror::Error;

/// 存储层错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("存储后端错误: {0}")]
    Backend(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// CatalogStore - 存储接口
// ==========================================
/// 目录存储接口
///
/// # 契约
/// - insert_entity 返回后端分配的实体引用
/// - upsert_period 以 (entity, year, month) 为唯一键, 重复即覆盖
/// - sale_exists / payment_exists 按指纹口径比对, 供软去重
pub trait CatalogStore {
    fn load_entities(&self) -> Result<Vec<CatalogEntity>, StoreError>;

    fn insert_entity(
        &mut self,
        identity: Vec<Option<String>>,
        cost: f64,
        prices: BTreeMap<String, f64>,
        source_row: Option<u32>,
    ) -> Result<EntityId, StoreError>;

    fn update_entity(&mut self, entity: &CatalogEntity) -> Result<(), StoreError>;

    fn upsert_period(&mut self, record: &PeriodRecord) -> Result<(), StoreError>;

    fn sale_exists(&self, fingerprint: &SaleFingerprint) -> Result<bool, StoreError>;

    fn insert_sale(&mut self, sale: &SaleTransaction) -> Result<(), StoreError>;

    fn payment_exists(&self, fingerprint: &PaymentFingerprint) -> Result<bool, StoreError>;

    fn insert_payment(&mut self, payment: &PaymentTransaction) -> Result<(), StoreError>;

    fn insert_loss(&mut self, loss: &LossTransaction) -> Result<(), StoreError>;

    fn record_rates(&mut self, year: i32, month: u32, rates: &ExchangeRates)
        -> Result<(), StoreError>;
}

// ==========================================
// MemoryStore - 内存实现
// ==========================================
/// 全内存的目录存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: i64,
    pub entities: Vec<CatalogEntity>,
    pub periods: BTreeMap<(EntityId, i32, u32), PeriodRecord>,
    pub sales: Vec<SaleTransaction>,
    pub payments: Vec<PaymentTransaction>,
    pub losses: Vec<LossTransaction>,
    pub rates: BTreeMap<(i32, u32), ExchangeRates>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl CatalogStore for MemoryStore {
    fn load_entities(&self) -> Result<Vec<CatalogEntity>, StoreError> {
        Ok(self.entities.clone())
    }

    fn insert_entity(
        &mut self,
        identity: Vec<Option<String>>,
        cost: f64,
        prices: BTreeMap<String, f64>,
        source_row: Option<u32>,
    ) -> Result<EntityId, StoreError> {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.push(CatalogEntity {
            id,
            identity,
            cost,
            prices,
            source_row,
        });
        Ok(id)
    }

    fn update_entity(&mut self, entity: &CatalogEntity) -> Result<(), StoreError> {
        let slot = self
            .entities
            .iter_mut()
            .find(|e| e.id == entity.id)
            .ok_or_else(|| StoreError::Backend(format!("实体不存在: {:?}", entity.id)))?;
        *slot = entity.clone();
        Ok(())
    }

    fn upsert_period(&mut self, record: &PeriodRecord) -> Result<(), StoreError> {
        self.periods
            .insert((record.entity, record.year, record.month), record.clone());
        Ok(())
    }

    fn sale_exists(&self, fingerprint: &SaleFingerprint) -> Result<bool, StoreError> {
        Ok(self
            .sales
            .iter()
            .any(|s| &SaleFingerprint::of(s) == fingerprint))
    }

    fn insert_sale(&mut self, sale: &SaleTransaction) -> Result<(), StoreError> {
        self.sales.push(sale.clone());
        Ok(())
    }

    fn payment_exists(&self, fingerprint: &PaymentFingerprint) -> Result<bool, StoreError> {
        Ok(self
            .payments
            .iter()
            .any(|p| &PaymentFingerprint::of(p) == fingerprint))
    }

    fn insert_payment(&mut self, payment: &PaymentTransaction) -> Result<(), StoreError> {
        self.payments.push(payment.clone());
        Ok(())
    }

    fn insert_loss(&mut self, loss: &LossTransaction) -> Result<(), StoreError> {
        self.losses.push(loss.clone());
        Ok(())
    }

    fn record_rates(
        &mut self,
        year: i32,
        month: u32,
        rates: &ExchangeRates,
    ) -> Result<(), StoreError> {
        self.rates.insert((year, month), *rates);
        Ok(())
    }
}
