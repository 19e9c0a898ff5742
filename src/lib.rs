// ==========================================
// 门店账本同步引擎 - 核心库
// ==========================================
// 依据: 门店 Excel 账本的既有格式约定（两代布局）
// 技术栈: calamine + rust_xlsxwriter
// 系统定位: 目录存储与 Excel 账本之间的双向同步层
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 结构定义与记录模型
pub mod domain;

// 读取层 - Excel 文档解析
pub mod reader;

// 匹配层 - 标识符规范化与目录索引
pub mod mapper;

// 写入层 - 公式保护与全量重写
pub mod writer;

// 编排层 - 导入/导出流水线
pub mod sync;

// 配置层
pub mod config;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 结构定义
pub use domain::schema::{DocumentSchema, ProductLine, SheetLayout};

// 文档记录
pub use domain::record::{
    DailyData, DayQty, ExchangeRates, InventoryData, InvoiceData, InvoiceGeneration,
    LossRow, PaymentExport, PaymentRow, ProductRow, SaleExport, SaleRow, StockLevel,
};

// 目录模型
pub use domain::catalog::{
    CatalogEntity, EntityId, LossTransaction, PaymentMethod, PaymentTransaction,
    PeriodRecord, SaleTransaction,
};

// 结果报告
pub use domain::outcome::SyncOutcome;

// 配置
pub use config::EngineConfig;

// 引擎与存储接口
pub use sync::store::{CatalogStore, MemoryStore, StoreError};
pub use sync::{SyncEngine, SyncError};
