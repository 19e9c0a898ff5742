// ==========================================
// 集成测试 - 导入流水线
// ==========================================


use sheet_sync::{
    logging, DocumentSchema, EngineConfig, MemoryStore, PaymentMethod, SyncEngine,
};
use test_helpers::*;

fn tyre_engine() -> SyncEngine<MemoryStore> {
    logging::init_test();
    let config = EngineConfig {
        backup_enabled: false,
        ..Default::default()
    };
    SyncEngine::with_config(DocumentSchema::tyre(), MemoryStore::new(), config)
}

fn phone_engine() -> SyncEngine<MemoryStore> {
    logging::init_test();
    let config = EngineConfig {
        backup_enabled: false,
        ..Default::default()
    };
    SyncEngine::with_config(DocumentSchema::phone(), MemoryStore::new(), config)
}

#[test]
fn test_import_inventory_creates_entities_and_periods() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tyre.xlsx");
    build_tyre_inventory(&path);

    let mut engine = tyre_engine();
    let outcome = engine.import_inventory(&path, 2025, 3).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.records_processed, 2, "汇总行必须被跳过");
    assert!(!outcome.file_digest.is_empty());

    let store = engine.store();
    assert_eq!(store.entities.len(), 2);
    let dunlop = &store.entities[0];
    assert_eq!(dunlop.identity[0].as_deref(), Some("185/65R15"));
    assert_eq!(dunlop.cost, 80000.0);
    assert_eq!(dunlop.prices["original"], 100000.0);
    assert_eq!(dunlop.source_row, Some(2));

    let period = &store.periods[&(dunlop.id, 2025, 3)];
    assert_eq!(period.initial_stock, 10);
    assert_eq!(period.added_stock, 2);
    assert_eq!(period.daily_sales.get(&5), Some(&3));

    // 新版单汇率: 两个口径同值
    let rates = &store.rates[&(2025, 3)];
    assert_eq!(rates.cash_rate, 1750.0);
    assert_eq!(rates.mukuru_rate, 1750.0);
}

#[test]
fn test_import_inventory_twice_updates_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tyre.xlsx");
    build_tyre_inventory(&path);

    let mut engine = tyre_engine();
    engine.import_inventory(&path, 2025, 3).unwrap();
    engine.import_inventory(&path, 2025, 3).unwrap();

    let store = engine.store();
    assert_eq!(store.entities.len(), 2, "重复导入不允许翻倍实体");
    assert_eq!(store.periods.len(), 2, "(实体, 年, 月) 周期唯一");
}

#[test]
fn test_import_invoice_new_generation() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = dir.path().join("tyre.xlsx");
    let invoice = dir.path().join("invoice.xlsx");
    build_tyre_inventory(&inventory);
    build_tyre_invoice(&invoice, 5.0, Some(190000.0));

    let mut engine = tyre_engine();
    engine.import_inventory(&inventory, 2025, 3).unwrap();
    let outcome = engine.import_invoice(&invoice, 2025, 3).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.records_processed, 2, "一笔销售 + 一笔付款");

    let store = engine.store();
    assert_eq!(store.sales.len(), 1);
    let sale = &store.sales[0];
    assert_eq!(sale.date, date(2025, 3, 8));
    assert_eq!(sale.qty, 4);
    assert_eq!(sale.discount_pct, 5.0);
    assert_eq!(sale.total, 190000.0);
    assert_eq!(sale.payment_method, PaymentMethod::Cash);
    assert_eq!(sale.customer_name.as_deref(), Some("John"));
    // "185/65 R15" 必须模糊匹配到库存行 "185/65R15"
    let entity = store.entities.iter().find(|e| e.id == sale.entity).unwrap();
    assert_eq!(entity.identity[0].as_deref(), Some("185/65R15"));

    assert_eq!(store.payments.len(), 1);
    assert_eq!(store.payments[0].payment_method, PaymentMethod::Mukuru);
    assert_eq!(store.payments[0].amount_mwk, 250000.0);

    // Statistic 表汇率入库
    let rates = &store.rates[&(2025, 3)];
    assert_eq!(rates.mukuru_rate, 1800.0);
    assert_eq!(rates.cash_rate, 1750.0);
}

#[test]
fn test_import_invoice_fraction_discount_and_missing_total() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = dir.path().join("tyre.xlsx");
    let invoice = dir.path().join("invoice.xlsx");
    build_tyre_inventory(&inventory);
    // 折扣写成小数 0.05, 合计留空
    build_tyre_invoice(&invoice, 0.05, None);

    let mut engine = tyre_engine();
    engine.import_inventory(&inventory, 2025, 3).unwrap();
    engine.import_invoice(&invoice, 2025, 3).unwrap();

    let sale = &engine.store().sales[0];
    assert_eq!(sale.discount_pct, 5.0, "0.05 归一为百分数口径");
    assert_eq!(sale.total, 4.0 * 50000.0 * 0.95);
}

#[test]
fn test_import_invoice_duplicate_fingerprint_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = dir.path().join("tyre.xlsx");
    let invoice = dir.path().join("invoice.xlsx");
    build_tyre_inventory(&inventory);
    build_tyre_invoice(&invoice, 5.0, Some(190000.0));

    let mut engine = tyre_engine();
    engine.import_inventory(&inventory, 2025, 3).unwrap();
    engine.import_invoice(&invoice, 2025, 3).unwrap();
    let second = engine.import_invoice(&invoice, 2025, 3).unwrap();

    assert!(second.success, "重复是警告, 不是失败");
    assert_eq!(second.records_processed, 0);
    assert!(!second.warnings.is_empty());
    assert_eq!(engine.store().sales.len(), 1);
    assert_eq!(engine.store().payments.len(), 1);
}

#[test]
fn test_import_invoice_unmatched_identity_warns_and_skips() {
    let dir = tempfile::tempdir().unwrap();
    let invoice = dir.path().join("invoice.xlsx");
    build_tyre_invoice(&invoice, 5.0, Some(190000.0));

    // 空目录: 任何标识符都匹配不上
    let mut engine = tyre_engine();
    let outcome = engine.import_invoice(&invoice, 2025, 3).unwrap();

    assert!(outcome.success);
    assert!(outcome.warnings.iter().any(|w| w.contains("未匹配")));
    assert!(engine.store().sales.is_empty());
    // 付款不走标识符匹配, 照常入库
    assert_eq!(engine.store().payments.len(), 1);
}

#[test]
fn test_import_old_generation_invoice() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = dir.path().join("tyre.xlsx");
    let invoice = dir.path().join("invoice_sep.xlsx");
    build_tyre_inventory(&inventory);
    build_old_tyre_invoice(&invoice);

    let mut engine = tyre_engine();
    // 目录先从 3 月库存表建好实体, 再回灌 9 月的旧版发票
    engine.import_inventory(&inventory, 2025, 3).unwrap();
    let outcome = engine.import_invoice(&invoice, 2024, 9).unwrap();

    assert!(outcome.success);
    let store = engine.store();
    assert_eq!(store.sales.len(), 2);

    let cash_sale = store
        .sales
        .iter()
        .find(|s| s.payment_method == PaymentMethod::Cash)
        .unwrap();
    assert_eq!(cash_sale.qty, 2);
    assert_eq!(cash_sale.discount_pct, 5.0, "Note 列 -0.05 归一为 5%");
    assert_eq!(cash_sale.total, 95000.0);

    let mukuru_sale = store
        .sales
        .iter()
        .find(|s| s.payment_method == PaymentMethod::Mukuru)
        .unwrap();
    // "secondhand" 别名 + "195 R15C" 尺寸修复都要走通
    let entity = store
        .entities
        .iter()
        .find(|e| e.id == mukuru_sale.entity)
        .unwrap();
    assert_eq!(entity.identity[0].as_deref(), Some("195R15C"));

    // Cash 表尾部付款子账
    assert_eq!(store.payments.len(), 1);
    assert_eq!(store.payments[0].customer, "Acme");
    assert_eq!(store.payments[0].amount_mwk, 120000.0);
    assert_eq!(store.payments[0].payment_method, PaymentMethod::Cash);
}

#[test]
fn test_import_daily_phone() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = dir.path().join("phone.xlsx");
    let daily = dir.path().join("daily.xlsx");
    build_phone_inventory(&inventory);
    build_phone_daily(&daily);

    let mut engine = phone_engine();
    engine.import_inventory(&inventory, 2025, 3).unwrap();
    let outcome = engine.import_daily(&daily, 2025, 3).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.records_processed, 3);

    let store = engine.store();
    assert_eq!(store.sales.len(), 1);
    assert_eq!(store.sales[0].qty, 2);
    assert_eq!(store.sales[0].payment_method, PaymentMethod::Mukuru);
    assert_eq!(store.payments.len(), 2);
    assert_eq!(store.payments[0].customer, "Banda");

    // 无日期的回款行继承文件中出现的第一个日期
    assert_eq!(store.payments[1].customer, "Phiri");
    assert_eq!(
        store.payments[1].date,
        chrono::NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()
    );

    // 双汇率布局
    let rates = &store.rates[&(2025, 3)];
    assert_eq!(rates.cash_rate, 1800.0);
    assert_eq!(rates.mukuru_rate, 1750.0);
}

#[test]
fn test_import_missing_file_is_hard_error() {
    let mut engine = tyre_engine();
    let missing = std::path::Path::new("/nonexistent/tyre.xlsx");
    assert!(engine.import_inventory(missing, 2025, 3).is_err());
}
