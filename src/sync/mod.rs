// ==========================================
// 门店账本同步引擎 - 同步编排层
// ==========================================
// 导入: 文件 → 读取层 → 匹配 → 存储提议, 行级失败降级为
// 警告/错误并继续, 只有文件级失败才中断整个操作。
// 导出: 存储侧快照 → 写出层全量重写。
// 同一文件上的操作经 PathLocks 串行。
// ==========================================

use crate::config::EngineConfig;
use crate::domain::catalog::{
    EntityId, LossTransaction, PaymentFingerprint, PaymentMethod, PaymentTransaction,
    SaleFingerprint, SaleTransaction,
};
use crate::domain::outcome::SyncOutcome;
use crate::domain::record::{
    DayQty, LossRow, PaymentExport, PaymentRow, SaleExport, SaleRow, StockLevel,
};
use crate::domain::schema::DocumentSchema;
use crate::mapper::CatalogIndex;
use crate::reader::{daily, invoice, inventory, ReadError};
use crate::writer::{self, WriteError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

// 存储接口
pub mod store;

// 按路径互斥
pub mod lock;

// 文件摘要
pub mod hash;

use lock::PathLocks;
use store::{CatalogStore, StoreError};

/// 编排层错误类型（文件级; 行级失败进 SyncOutcome）
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("读取失败: {0}")]
    Read(#[from] ReadError),

    #[error("写入失败: {0}")]
    Write(#[from] WriteError),

    #[error("存储失败: {0}")]
    Store(#[from] StoreError),

    #[error("摘要计算失败: {0}")]
    Hash(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// SyncEngine - 同步引擎
// ==========================================
/// 一条产品线的同步引擎
///
/// # 职责
/// 1. import_inventory / import_invoice / import_daily: 文件 → 目录
/// 2. export_inventory / export_invoice: 目录快照 → 文件
/// 3. 文件级互斥、前置备份（写出层内）、内容摘要
pub struct SyncEngine<S: CatalogStore> {
    schema: DocumentSchema,
    store: S,
    config: EngineConfig,
    locks: PathLocks,
}

impl<S: CatalogStore> SyncEngine<S> {
    pub fn new(schema: DocumentSchema, store: S) -> Self {
        SyncEngine::with_config(schema, store, EngineConfig::default())
    }

    pub fn with_config(schema: DocumentSchema, store: S, config: EngineConfig) -> Self {
        SyncEngine {
            schema,
            store,
            config,
            locks: PathLocks::new(),
        }
    }

    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// 文件内容摘要（SHA-256 hex）
    pub fn file_hash(&self, path: &Path) -> Result<String, SyncError> {
        hash::file_digest(path).map_err(|e| SyncError::Hash(e.to_string()))
    }

    // ==========================================
    // 导入: 库存
    // ==========================================
    /// 导入某月库存表: 产品行合入目录, 周期状态整条覆盖
    ///
    /// 精确匹配命中 → 更新成本/价格/行号绑定; 未命中 → 新建实体。
    /// 行级存储失败计入 errors 并继续处理后续行。
    pub fn import_inventory(
        &mut self,
        path: &Path,
        year: i32,
        month: u32,
    ) -> Result<SyncOutcome, SyncError> {
        let cell = self.locks.cell(path);
        let _guard = cell.lock().unwrap_or_else(|e| e.into_inner());

        let digest = self.file_hash(path)?;
        let data = inventory::read_inventory_data(path, &self.schema, month)?;
        let entities = self.store.load_entities()?;
        let index = CatalogIndex::build(&self.schema, &entities);

        let mut outcome = SyncOutcome::new(digest);
        for row in &data.rows {
            let entity_id = match index.match_exact(&row.identity) {
                Some(id) => {
                    // 命中即刷新目录侧的成本/价格/行号绑定
                    let Some(entity) = entities.iter().find(|e| e.id == id) else {
                        outcome.error(format!("索引引用了不存在的实体: {:?}", id));
                        continue;
                    };
                    let mut entity = entity.clone();
                    entity.cost = row.cost;
                    entity.prices = row.prices.clone();
                    entity.source_row = Some(row.row);
                    if let Err(e) = self.store.update_entity(&entity) {
                        outcome.error(format!("第 {} 行实体更新失败: {}", row.row, e));
                        continue;
                    }
                    id
                }
                None => match self.store.insert_entity(
                    row.identity.clone(),
                    row.cost,
                    row.prices.clone(),
                    Some(row.row),
                ) {
                    Ok(id) => id,
                    Err(e) => {
                        outcome.error(format!("第 {} 行实体新建失败: {}", row.row, e));
                        continue;
                    }
                },
            };

            let record = crate::domain::catalog::PeriodRecord {
                entity: entity_id,
                year,
                month,
                initial_stock: row.initial_stock,
                added_stock: row.added_stock,
                daily_sales: row.daily_sales.clone(),
            };
            if let Err(e) = self.store.upsert_period(&record) {
                outcome.error(format!("第 {} 行周期写入失败: {}", row.row, e));
                continue;
            }
            outcome.records_processed += 1;
        }

        self.store.record_rates(year, month, &data.rates)?;
        info!(
            file = %path.display(),
            month,
            records = outcome.records_processed,
            errors = outcome.errors.len(),
            "库存导入完成"
        );
        Ok(outcome)
    }

    // ==========================================
    // 导入: 发票
    // ==========================================
    /// 导入一个发票文件（两代格式自动识别）
    ///
    /// 未匹配标识符与重复指纹降级为警告跳过; 汇率顺带入库。
    pub fn import_invoice(
        &mut self,
        path: &Path,
        year: i32,
        month: u32,
    ) -> Result<SyncOutcome, SyncError> {
        let cell = self.locks.cell(path);
        let _guard = cell.lock().unwrap_or_else(|e| e.into_inner());

        let digest = self.file_hash(path)?;
        let data = invoice::read_invoice(path, &self.schema)?;
        let default_date = fallback_date(&data.sales, &data.payments, year, month)?;
        let entities = self.store.load_entities()?;
        let index = CatalogIndex::build(&self.schema, &entities);

        let mut outcome = SyncOutcome::new(digest);
        self.ingest_sales(&mut outcome, &index, &data.sales, default_date)?;
        self.ingest_payments(&mut outcome, &data.payments, default_date)?;
        self.ingest_losses(&mut outcome, &index, &data.losses, default_date)?;
        self.store.record_rates(year, month, &data.rates)?;

        info!(
            file = %path.display(),
            generation = ?data.generation,
            records = outcome.records_processed,
            warnings = outcome.warnings.len(),
            "发票导入完成"
        );
        Ok(outcome)
    }

    // ==========================================
    // 导入: 日销售
    // ==========================================
    /// 导入一个日销售文件（销售 + 付款, 与发票同口径入库）
    pub fn import_daily(
        &mut self,
        path: &Path,
        year: i32,
        month: u32,
    ) -> Result<SyncOutcome, SyncError> {
        let cell = self.locks.cell(path);
        let _guard = cell.lock().unwrap_or_else(|e| e.into_inner());

        let digest = self.file_hash(path)?;
        let data = daily::read_daily(path, &self.schema)?;
        let default_date = fallback_date(&data.sales, &data.payments, year, month)?;
        let entities = self.store.load_entities()?;
        let index = CatalogIndex::build(&self.schema, &entities);

        let mut outcome = SyncOutcome::new(digest);
        self.ingest_sales(&mut outcome, &index, &data.sales, default_date)?;
        self.ingest_payments(&mut outcome, &data.payments, default_date)?;

        info!(
            file = %path.display(),
            records = outcome.records_processed,
            warnings = outcome.warnings.len(),
            "日销售导入完成"
        );
        Ok(outcome)
    }

    fn ingest_sales(
        &mut self,
        outcome: &mut SyncOutcome,
        index: &CatalogIndex,
        sales: &[SaleRow],
        default_date: NaiveDate,
    ) -> Result<(), SyncError> {
        for row in sales {
            let Some(entity) = index.match_fuzzy(&row.identity) else {
                outcome.warn(format!("销售行标识符未匹配, 跳过: {:?}", row.identity));
                continue;
            };
            let discount_pct = normalize_discount(row.discount);
            let date = row.date.unwrap_or(default_date);
            let total = if row.total != 0.0 {
                row.total
            } else {
                row.qty as f64 * row.unit_price * (1.0 - discount_pct / 100.0)
            };
            let tx = SaleTransaction {
                date,
                entity,
                qty: row.qty,
                unit_price: row.unit_price,
                discount_pct,
                total,
                payment_method: PaymentMethod::parse(row.payment_method.as_deref()),
                customer_name: row.customer_name.clone(),
            };
            if self.store.sale_exists(&SaleFingerprint::of(&tx))? {
                outcome.warn(format!(
                    "销售重复, 跳过: {} x{} @ {}",
                    date, tx.qty, tx.unit_price
                ));
                continue;
            }
            self.store.insert_sale(&tx)?;
            outcome.records_processed += 1;
        }
        Ok(())
    }

    fn ingest_payments(
        &mut self,
        outcome: &mut SyncOutcome,
        payments: &[PaymentRow],
        default_date: NaiveDate,
    ) -> Result<(), SyncError> {
        for row in payments {
            if row.amount_mwk <= 0.0 {
                continue;
            }
            let tx = PaymentTransaction {
                date: row.date.unwrap_or(default_date),
                customer: row
                    .customer
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                payment_method: PaymentMethod::parse(row.payment_method.as_deref()),
                amount_mwk: row.amount_mwk,
            };
            if self.store.payment_exists(&PaymentFingerprint::of(&tx))? {
                outcome.warn(format!(
                    "付款重复, 跳过: {} {} {}",
                    tx.date, tx.customer, tx.amount_mwk
                ));
                continue;
            }
            self.store.insert_payment(&tx)?;
            outcome.records_processed += 1;
        }
        Ok(())
    }

    fn ingest_losses(
        &mut self,
        outcome: &mut SyncOutcome,
        index: &CatalogIndex,
        losses: &[LossRow],
        default_date: NaiveDate,
    ) -> Result<(), SyncError> {
        for row in losses {
            let Some(entity) = index.match_fuzzy(&row.identity) else {
                outcome.warn(format!("损耗行标识符未匹配, 跳过: {:?}", row.identity));
                continue;
            };
            let tx = LossTransaction {
                date: row.date.unwrap_or(default_date),
                entity,
                qty: row.qty,
                cost: row.cost,
                exchanged: parse_exchanged(row.exchanged.as_deref()),
                refund: row.refund,
                total_refund: row.total_refund,
                note: row.note.clone(),
            };
            self.store.insert_loss(&tx)?;
            outcome.records_processed += 1;
        }
        Ok(())
    }

    // ==========================================
    // 导出: 库存
    // ==========================================
    /// 把调用方给定的库存快照写回账本
    ///
    /// 实体引用经目录侧的 source_row 解析到目标行; 未绑定行号的
    /// 实体警告跳过。摘要取保存后的文件内容。
    pub fn export_inventory(
        &mut self,
        path: &Path,
        month: u32,
        stock: &[StockLevel],
        sales_by_day: &BTreeMap<u32, Vec<DayQty>>,
    ) -> Result<SyncOutcome, SyncError> {
        let cell = self.locks.cell(path);
        let _guard = cell.lock().unwrap_or_else(|e| e.into_inner());

        let rows: BTreeMap<EntityId, u32> = self
            .store
            .load_entities()?
            .into_iter()
            .filter_map(|e| e.source_row.map(|row| (e.id, row)))
            .collect();

        // 摘要待保存后回填
        let mut outcome = SyncOutcome::new(String::new());

        let mut row_stock = Vec::with_capacity(stock.len());
        for level in stock {
            let Some(&row) = rows.get(&level.entity) else {
                outcome.warn(format!("实体未绑定行号, 跳过: {:?}", level.entity));
                continue;
            };
            row_stock.push(writer::inventory::RowStock {
                row,
                initial_stock: level.initial_stock,
                added_stock: level.added_stock,
            });
        }

        let mut row_sales: BTreeMap<u32, Vec<writer::inventory::RowQty>> = BTreeMap::new();
        for (&day, entries) in sales_by_day {
            for dq in entries {
                let Some(&row) = rows.get(&dq.entity) else {
                    outcome.warn(format!("实体未绑定行号, 跳过: {:?}", dq.entity));
                    continue;
                };
                row_sales
                    .entry(day)
                    .or_default()
                    .push(writer::inventory::RowQty { row, qty: dq.qty });
            }
        }

        let report = writer::inventory::export_inventory_batch(
            path,
            &self.schema,
            month,
            &row_stock,
            &row_sales,
            &self.config,
        )?;
        outcome.records_processed = report.records_written;
        outcome.sheet_created = report.sheet_created;
        outcome.file_digest = self.file_hash(path)?;

        if !outcome.warnings.is_empty() {
            warn!(
                file = %path.display(),
                skipped = outcome.warnings.len(),
                "库存导出存在未绑定实体"
            );
        }
        Ok(outcome)
    }

    // ==========================================
    // 导出: 发票
    // ==========================================
    /// 把调用方给定的销售/付款快照写回发票文件
    pub fn export_invoice(
        &mut self,
        path: &Path,
        sales: &[SaleExport],
        payments: &[PaymentExport],
    ) -> Result<SyncOutcome, SyncError> {
        let cell = self.locks.cell(path);
        let _guard = cell.lock().unwrap_or_else(|e| e.into_inner());

        let (sales_written, payments_written) = writer::invoice::export_invoice_batch(
            path,
            &self.schema,
            sales,
            payments,
            &self.config,
        )?;

        let mut outcome = SyncOutcome::new(self.file_hash(path)?);
        outcome.records_processed = sales_written + payments_written;
        Ok(outcome)
    }
}

/// 折扣归一到百分数口径（0.05 → 5）
fn normalize_discount(raw: f64) -> f64 {
    if raw > 0.0 && raw < 1.0 {
        raw * 100.0
    } else {
        raw
    }
}

/// 自由文本 → 是否已换货
fn parse_exchanged(raw: Option<&str>) -> bool {
    let Some(raw) = raw else {
        return false;
    };
    matches!(
        raw.trim().to_lowercase().as_str(),
        "yes" | "y" | "true" | "1" | "是"
    )
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, SyncError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| SyncError::Other(anyhow::anyhow!("非法年月: {year}-{month}")))
}

/// 缺失日期的兜底值: 取文件中出现的第一个日期（先销售后回款）,
/// 文件里一个日期都没有时退回当期一号
fn fallback_date(
    sales: &[SaleRow],
    payments: &[PaymentRow],
    year: i32,
    month: u32,
) -> Result<NaiveDate, SyncError> {
    if let Some(date) = sales
        .iter()
        .filter_map(|r| r.date)
        .chain(payments.iter().filter_map(|r| r.date))
        .next()
    {
        return Ok(date);
    }
    first_of_month(year, month)
}
