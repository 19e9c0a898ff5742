// ==========================================
// 门店账本同步引擎 - 先备份
// ==========================================
// 写操作触及文件前无条件落一份带时间戳的副本。
// 备份是普通文件拷贝, 不是原子改名; 备份与保存之间崩溃
// 会留下"已备份但未更新"的原文件, 属于可恢复的失败形态。
// ==========================================

use crate::config::EngineConfig;
use crate::writer::WriteError;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 改写前备份目标文件
///
/// 返回备份文件路径; 配置关闭备份时返回 None。
/// 备份目录建在目标文件同级（缺省名 "backups"）,
/// 文件名带 "{YYYYmmdd_HHMMSS}" 时间戳。
pub fn create_backup(path: &Path, config: &EngineConfig) -> Result<Option<PathBuf>, WriteError> {
    if !config.backup_enabled {
        return Ok(None);
    }
    if !path.exists() {
        return Err(WriteError::FileNotFound(path.display().to_string()));
    }

    let backup_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&config.backup_dir);
    fs::create_dir_all(&backup_dir)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup_path = backup_dir.join(format!("{stem}_{timestamp}{ext}"));

    fs::copy(path, &backup_path)?;
    debug!(源 = %path.display(), 备份 = %backup_path.display(), "备份完成");
    Ok(Some(backup_path))
}
