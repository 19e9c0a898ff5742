// ==========================================
// 门店账本同步引擎 - 引擎配置
// ==========================================

use serde::{Deserialize, Serialize};

/// 引擎配置
///
/// 备份是引擎唯一的恢复手段（文件自身没有撤销）, 默认开启;
/// 只有一次性测试夹具才应该关掉它。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 写操作前是否备份
    pub backup_enabled: bool,
    /// 备份目录名（建在目标文件同级）
    pub backup_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            backup_enabled: true,
            backup_dir: "backups".to_string(),
        }
    }
}
