// ==========================================
// 门店账本同步引擎 - 按文件路径互斥
// ==========================================
// 同一账本文件上的操作全程串行, 不同文件互不阻塞。
// 锁粒度为规范化后的路径, 同一文件的不同写法共用一把锁。
// ==========================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 路径 → 互斥锁注册表
///
/// cell() 返回该路径对应的锁单元, 调用方在本地作用域内持有
/// 守卫; 注册表只负责派发, 不持有任何守卫。
#[derive(Debug, Default)]
pub struct PathLocks {
    cells: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        PathLocks::default()
    }

    /// 取路径对应的锁单元（不存在则建）
    pub fn cell(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.entry(key).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_shares_cell() {
        let locks = PathLocks::new();
        let a = locks.cell(Path::new("/tmp/ledger-does-not-exist.xlsx"));
        let b = locks.cell(Path::new("/tmp/ledger-does-not-exist.xlsx"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_different_paths_do_not_share_cell() {
        let locks = PathLocks::new();
        let a = locks.cell(Path::new("/tmp/a.xlsx"));
        let b = locks.cell(Path::new("/tmp/b.xlsx"));
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
