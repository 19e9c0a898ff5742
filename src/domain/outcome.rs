// ==========================================
// 门店账本同步引擎 - 同步结果
// ==========================================
// 结果是报告, 不是事务边界: 下游失败前已写入的内容保持已写入
// ==========================================

use serde::{Deserialize, Serialize};

/// 一次导入/导出操作的结果报告
///
/// errors 非空时 success 为 false; warnings 记录被跳过的行
/// （未匹配标识符、重复指纹、坏日期等）, 不影响 success。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub records_processed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// 本次操作触及文件的内容摘要（SHA-256 hex）
    pub file_digest: String,
    /// 导出时是否新建了周期表
    pub sheet_created: bool,
}

impl SyncOutcome {
    pub fn new(digest: String) -> Self {
        SyncOutcome {
            success: true,
            file_digest: digest,
            ..Default::default()
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.success = false;
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_clears_success() {
        let mut outcome = SyncOutcome::new("abc".to_string());
        assert!(outcome.success);

        outcome.warn("跳过一行");
        assert!(outcome.success, "警告不应影响 success");

        outcome.error("写入失败");
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_outcome_json_roundtrip() {
        let mut outcome = SyncOutcome::new("d41d8c".to_string());
        outcome.records_processed = 7;
        outcome.sheet_created = true;
        outcome.warn("标识符未匹配, 跳过");

        let json = serde_json::to_string(&outcome).expect("序列化失败");
        assert!(json.contains("\"records_processed\":7"));

        let back: SyncOutcome = serde_json::from_str(&json).expect("反序列化失败");
        assert_eq!(back, outcome);
    }
}
