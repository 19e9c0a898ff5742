// ==========================================
// 集成测试 - 导出与往返
// ==========================================


use sheet_sync::reader::inventory::{read_inventory, read_rates};
use sheet_sync::writer::workbook::{CellContent, WorkbookModel};
use sheet_sync::{
    logging, DayQty, DocumentSchema, EngineConfig, EntityId, MemoryStore, StockLevel,
    SyncEngine,
};
use std::collections::BTreeMap;
use test_helpers::*;

fn tyre_engine(backup: bool) -> SyncEngine<MemoryStore> {
    logging::init_test();
    let config = EngineConfig {
        backup_enabled: backup,
        ..Default::default()
    };
    SyncEngine::with_config(DocumentSchema::tyre(), MemoryStore::new(), config)
}

#[test]
fn test_export_inventory_roundtrip_with_sheet_creation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tyre.xlsx");
    build_tyre_inventory(&path);

    let mut engine = tyre_engine(false);
    engine.import_inventory(&path, 2025, 3).unwrap();
    let dunlop = engine.store().entities[0].id;

    // 4 月表尚不存在, 导出必须补建
    let stock = vec![StockLevel {
        entity: dunlop,
        initial_stock: 8,
        added_stock: 1,
    }];
    let mut sales_by_day = BTreeMap::new();
    sales_by_day.insert(10u32, vec![DayQty { entity: dunlop, qty: 2 }]);

    let outcome = engine
        .export_inventory(&path, 4, &stock, &sales_by_day)
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.sheet_created);
    assert!(!outcome.file_digest.is_empty());
    assert_eq!(outcome.file_digest, engine.file_hash(&path).unwrap());

    // 写出的 4 月表要能按库存口径读回来
    let schema = DocumentSchema::tyre();
    let rows = read_inventory(&path, &schema, 4).unwrap();
    let dunlop_row = rows.iter().find(|r| r.row == 2).unwrap();
    assert_eq!(dunlop_row.initial_stock, 8);
    assert_eq!(dunlop_row.added_stock, 1);
    assert_eq!(dunlop_row.daily_sales.get(&10), Some(&2));
    // 模板行的旧值必须被清掉
    let maxxis_row = rows.iter().find(|r| r.row == 3).unwrap();
    assert_eq!(maxxis_row.initial_stock, 0);

    // 汇率单元格随模板带到新表
    let rates = read_rates(&path, &schema, 4).unwrap();
    assert_eq!(rates.cash_rate, 1750.0);

    // 3 月原表不受影响
    let march = read_inventory(&path, &schema, 3).unwrap();
    assert_eq!(march.iter().find(|r| r.row == 2).unwrap().initial_stock, 10);
}

#[test]
fn test_export_inventory_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tyre.xlsx");
    build_tyre_inventory(&path);

    let mut engine = tyre_engine(false);
    engine.import_inventory(&path, 2025, 3).unwrap();
    let dunlop = engine.store().entities[0].id;

    let stock = vec![StockLevel {
        entity: dunlop,
        initial_stock: 8,
        added_stock: 1,
    }];
    let sales_by_day = BTreeMap::new();

    let first_outcome = engine.export_inventory(&path, 3, &stock, &sales_by_day).unwrap();
    let first = read_inventory(&path, &DocumentSchema::tyre(), 3).unwrap();
    // 隔一段时间再导出: 摘要不允许随时间漂移
    std::thread::sleep(std::time::Duration::from_millis(1500));
    let second_outcome = engine.export_inventory(&path, 3, &stock, &sales_by_day).unwrap();
    let second = read_inventory(&path, &DocumentSchema::tyre(), 3).unwrap();

    assert!(!second_outcome.sheet_created);
    assert_eq!(first, second, "重复导出同一快照必须读回同一数据");
    assert_eq!(
        first_outcome.file_digest, second_outcome.file_digest,
        "未变更的快照重复导出必须产生相同内容摘要"
    );
}

#[test]
fn test_export_preserves_formula_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tyre.xlsx");
    build_tyre_inventory(&path);

    let mut engine = tyre_engine(false);
    engine.import_inventory(&path, 2025, 3).unwrap();
    let dunlop = engine.store().entities[0].id;

    let stock = vec![StockLevel {
        entity: dunlop,
        initial_stock: 5,
        added_stock: 0,
    }];
    engine
        .export_inventory(&path, 3, &stock, &BTreeMap::new())
        .unwrap();

    let model = WorkbookModel::load(&path).unwrap();
    let sheet = model.sheet("Tyre List_3月").unwrap();
    assert_eq!(
        sheet.get(2, 8),
        Some(&CellContent::Formula("=M2+N2-SUM(O2:AS2)".into())),
        "公式单元格必须原样穿透导出"
    );
}

#[test]
fn test_formula_column_refusal_leaves_file_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tyre.xlsx");
    build_tyre_inventory(&path);
    let digest_before = sheet_sync::sync::hash::file_digest(&path).unwrap();

    // 布局被改坏: 期初列落进公式列集合, 任何写入都必须被拒绝
    let mut schema = DocumentSchema::tyre();
    schema.new_layout.formula_cols.insert(schema.new_layout.initial_stock_col);

    let stock = vec![sheet_sync::writer::inventory::RowStock {
        row: 2,
        initial_stock: 5,
        added_stock: 0,
    }];
    let config = EngineConfig {
        backup_enabled: false,
        ..Default::default()
    };
    let err = sheet_sync::writer::inventory::export_inventory_batch(
        &path,
        &schema,
        3,
        &stock,
        &BTreeMap::new(),
        &config,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        sheet_sync::writer::WriteError::FormulaColumn { .. }
    ));

    let digest_after = sheet_sync::sync::hash::file_digest(&path).unwrap();
    assert_eq!(digest_before, digest_after, "拒绝写入后文件必须原封不动");
}

#[test]
fn test_export_unbound_entity_is_warned_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tyre.xlsx");
    build_tyre_inventory(&path);

    let mut engine = tyre_engine(false);
    engine.import_inventory(&path, 2025, 3).unwrap();

    let stock = vec![StockLevel {
        entity: EntityId(999),
        initial_stock: 4,
        added_stock: 0,
    }];
    let outcome = engine
        .export_inventory(&path, 3, &stock, &BTreeMap::new())
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.records_processed, 0);
    assert!(outcome.warnings.iter().any(|w| w.contains("未绑定")));
}

#[test]
fn test_export_creates_backup_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tyre.xlsx");
    build_tyre_inventory(&path);

    let mut engine = tyre_engine(true);
    engine.import_inventory(&path, 2025, 3).unwrap();
    let dunlop = engine.store().entities[0].id;
    let stock = vec![StockLevel {
        entity: dunlop,
        initial_stock: 7,
        added_stock: 0,
    }];
    engine
        .export_inventory(&path, 3, &stock, &BTreeMap::new())
        .unwrap();

    let backups: Vec<_> = std::fs::read_dir(dir.path().join("backups"))
        .unwrap()
        .collect();
    assert_eq!(backups.len(), 1);
    let name = backups[0].as_ref().unwrap().file_name();
    let name = name.to_string_lossy().into_owned();
    assert!(name.starts_with("tyre_"), "备份名: {name}");
    assert!(name.ends_with(".xlsx"));
}

#[test]
fn test_export_invoice_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = dir.path().join("tyre.xlsx");
    let invoice = dir.path().join("invoice_out.xlsx");
    build_tyre_inventory(&inventory);

    let mut engine = tyre_engine(false);
    engine.import_inventory(&inventory, 2025, 3).unwrap();

    let sales = vec![sheet_sync::SaleExport {
        date: Some(date(2025, 3, 8)),
        // 与发票列序对齐的身份属性: size/type/brand/pattern
        identity: vec![
            Some("185/65R15".into()),
            Some("new".into()),
            Some("DUNLOP".into()),
            None,
        ],
        qty: 4,
        unit_price: 50000.0,
        discount: 0.05,
        payment_method: Some("Cash".into()),
        customer_name: Some("John".into()),
    }];
    let payments = vec![sheet_sync::PaymentExport {
        date: Some(date(2025, 3, 9)),
        customer: Some("Acme".into()),
        payment_method: Some("Mukuru".into()),
        amount_mwk: 250000.0,
    }];

    // 文件不存在: 导出必须按结构新建
    let outcome = engine.export_invoice(&invoice, &sales, &payments).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.records_processed, 2);

    // 写出的发票要能被导入流水线读回并匹配
    let mut reimport = tyre_engine(false);
    reimport.import_inventory(&inventory, 2025, 3).unwrap();
    reimport.import_invoice(&invoice, 2025, 3).unwrap();

    let store = reimport.store();
    assert_eq!(store.sales.len(), 1);
    let sale = &store.sales[0];
    assert_eq!(sale.qty, 4);
    assert_eq!(sale.discount_pct, 5.0);
    // 合计列是公式, 读回无缓存值, 导入方按折扣重算
    assert_eq!(sale.total, 4.0 * 50000.0 * 0.95);
    assert_eq!(store.payments.len(), 1);
    assert_eq!(store.payments[0].amount_mwk, 250000.0);
}

#[test]
fn test_export_invoice_overwrite_replaces_old_rows() {
    let dir = tempfile::tempdir().unwrap();
    let invoice = dir.path().join("invoice_out.xlsx");

    let mut engine = tyre_engine(false);
    let sale = |qty: i64| sheet_sync::SaleExport {
        date: Some(date(2025, 3, 8)),
        identity: vec![Some("185/65R15".into()), Some("new".into()), None, None],
        qty,
        unit_price: 50000.0,
        discount: 0.0,
        payment_method: None,
        customer_name: None,
    };

    engine
        .export_invoice(&invoice, &[sale(1), sale(2), sale(3)], &[])
        .unwrap();
    let outcome = engine.export_invoice(&invoice, &[sale(9)], &[]).unwrap();
    assert_eq!(outcome.records_processed, 1);

    let model = WorkbookModel::load(&invoice).unwrap();
    let sheet = model.sheet("Sales Record").unwrap();
    assert_eq!(sheet.get(2, 5), Some(&CellContent::Number(9.0)));
    assert!(sheet.get(3, 5).is_none(), "旧行必须被整体清掉");
    assert!(sheet.get(4, 5).is_none());
}
