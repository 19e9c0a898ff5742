// ==========================================
// 门店账本同步引擎 - 领域层
// ==========================================

// 文档结构定义（布局解析器）
pub mod schema;

// 文档记录模型
pub mod record;

// 目录领域模型
pub mod catalog;

// 同步结果
pub mod outcome;

pub use catalog::{
    CatalogEntity, EntityId, LossTransaction, PaymentFingerprint, PaymentMethod,
    PaymentTransaction, PeriodRecord, SaleFingerprint, SaleTransaction,
};
pub use outcome::SyncOutcome;
pub use record::{
    DailyData, DayQty, ExchangeRates, InventoryData, InvoiceData, InvoiceGeneration,
    LossRow, PaymentExport, PaymentRow, ProductRow, SaleExport, SaleRow, StockLevel,
};
pub use schema::{
    DocumentSchema, InvoiceSchema, LayoutError, OldInvoiceSchema, OldInvoiceSheet,
    ProductLine, RateCells, SheetLayout, MONTH_GLYPH,
};
