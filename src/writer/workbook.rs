// ==========================================
// 门店账本同步引擎 - 工作簿内存编辑模型
// ==========================================
// 写路径是"读模型-改模型-整簿重写": 用 calamine 把所有表的
// 值与公式装进内存模型, 在模型上变更, 再用 rust_xlsxwriter
// 序列化完整工作簿。公式单元格以公式文本原样穿透, 不落为数值。
// 所有变更都发生在模型上, 只有成功路径才会触达磁盘。
// ==========================================

use crate::writer::WriteError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDate;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Formula, Workbook};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ==========================================
// CellContent - 单元格内容
// ==========================================
/// 模型中一个单元格的内容
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    /// 公式文本（带不带前导 "=" 均可）
    Formula(String),
}

// ==========================================
// SheetModel - 单表模型
// ==========================================
/// 一张工作表的稀疏单元格表, 键为 1 起始 (行, 列)
#[derive(Debug, Clone, Default)]
pub struct SheetModel {
    pub name: String,
    cells: BTreeMap<(u32, u32), CellContent>,
}

impl SheetModel {
    pub fn new(name: impl Into<String>) -> Self {
        SheetModel {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&CellContent> {
        self.cells.get(&(row, col))
    }

    /// 无保护写入（表头、公式穿透等内部用途）
    pub fn set(&mut self, row: u32, col: u32, content: CellContent) {
        self.cells.insert((row, col), content);
    }

    pub fn clear(&mut self, row: u32, col: u32) {
        self.cells.remove(&(row, col));
    }

    /// 带公式保护的写入
    ///
    /// 目标列落在公式列集合内 → 变更前硬失败。静默跳过会掩盖
    /// 调用方 bug, 所以这里必须抛错。content 取 None 表示置空。
    pub fn set_guarded(
        &mut self,
        row: u32,
        col: u32,
        content: Option<CellContent>,
        formula_cols: &BTreeSet<u32>,
    ) -> Result<(), WriteError> {
        if formula_cols.contains(&col) {
            return Err(WriteError::FormulaColumn {
                col,
                formula_cols: formula_cols.iter().copied().collect(),
            });
        }
        match content {
            Some(content) => self.set(row, col, content),
            None => self.clear(row, col),
        }
        Ok(())
    }

    /// 模型中的最大行号（1 起始）, 空表为 0
    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(r, _)| *r).max().unwrap_or(0)
    }

    /// 清掉 min_row 行起的全部单元格（发票全量重写用, 保留表头）
    pub fn clear_rows_from(&mut self, min_row: u32) {
        self.cells.retain(|(r, _), _| *r < min_row);
    }
}

// ==========================================
// WorkbookModel - 整簿模型
// ==========================================
/// 一个工作簿的全部表模型, 保持表序
#[derive(Debug, Clone, Default)]
pub struct WorkbookModel {
    sheets: Vec<SheetModel>,
}

impl WorkbookModel {
    /// 空工作簿（建新文件用）
    pub fn empty() -> Self {
        WorkbookModel::default()
    }

    /// 从既有文件装载（值 + 公式）
    pub fn load(path: &Path) -> Result<Self, WriteError> {
        if !path.exists() {
            return Err(WriteError::FileNotFound(path.display().to_string()));
        }
        let mut wb: Xlsx<_> = open_workbook(path)
            .map_err(|e: calamine::XlsxError| WriteError::LoadError(e.to_string()))?;

        let mut model = WorkbookModel::default();
        for name in wb.sheet_names().to_vec() {
            let mut sheet = SheetModel::new(&name);

            let range = wb
                .worksheet_range(&name)
                .map_err(|e| WriteError::LoadError(e.to_string()))?;
            if let Some((start_r, start_c)) = range.start() {
                for (r, row) in range.rows().enumerate() {
                    for (c, value) in row.iter().enumerate() {
                        let row1 = start_r + r as u32 + 1;
                        let col1 = start_c + c as u32 + 1;
                        if let Some(content) = cell_from_data(value) {
                            sheet.set(row1, col1, content);
                        }
                    }
                }
            }

            // 公式覆盖缓存值: 公式单元格以公式文本穿透。
            // calamine 返回的公式文本不带前导 "=", 统一补齐,
            // 使读回的模型与手工构建的模型可直接比较。
            if let Ok(formulas) = wb.worksheet_formula(&name) {
                if let Some((start_r, start_c)) = formulas.start() {
                    for (r, row) in formulas.rows().enumerate() {
                        for (c, text) in row.iter().enumerate() {
                            if text.is_empty() {
                                continue;
                            }
                            let row1 = start_r + r as u32 + 1;
                            let col1 = start_c + c as u32 + 1;
                            let text = if text.starts_with('=') {
                                text.clone()
                            } else {
                                format!("={text}")
                            };
                            sheet.set(row1, col1, CellContent::Formula(text));
                        }
                    }
                }
            }

            model.sheets.push(sheet);
        }
        Ok(model)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetModel> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut SheetModel, WriteError> {
        self.sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| WriteError::SheetMissing(name.to_string()))
    }

    /// 追加一张空表并返回可变引用
    pub fn add_sheet(&mut self, name: impl Into<String>) -> &mut SheetModel {
        self.sheets.push(SheetModel::new(name));
        self.sheets.last_mut().expect("刚插入的表必然存在")
    }

    /// 以既有表为模板克隆一张新表（表头、静态列、公式一并带走）
    pub fn clone_sheet(&mut self, source: &str, new_name: &str) -> Result<(), WriteError> {
        let mut cloned = self
            .sheet(source)
            .ok_or_else(|| WriteError::SheetMissing(source.to_string()))?
            .clone();
        cloned.name = new_name.to_string();
        self.sheets.push(cloned);
        Ok(())
    }

    /// 序列化完整工作簿到磁盘
    ///
    /// 文档属性用固定创建时间: 同一模型重复保存必须产生相同字节,
    /// 否则调用方的内容摘要变更检测会把未变更的文件误判为已变更。
    pub fn save(&self, path: &Path) -> Result<(), WriteError> {
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let mut wb = Workbook::new();
        let creation = ExcelDateTime::from_ymd(2000, 1, 1)?;
        wb.set_properties(&DocProperties::new().set_creation_datetime(&creation));

        for sheet in &self.sheets {
            let ws = wb.add_worksheet();
            ws.set_name(&sheet.name)?;
            for (&(row, col), content) in &sheet.cells {
                let r = row - 1;
                let c = (col - 1) as u16;
                match content {
                    CellContent::Number(n) => {
                        ws.write_number(r, c, *n)?;
                    }
                    CellContent::Text(s) => {
                        ws.write_string(r, c, s)?;
                    }
                    CellContent::Bool(b) => {
                        ws.write_boolean(r, c, *b)?;
                    }
                    CellContent::Date(d) => {
                        ws.write_datetime_with_format(r, c, *d, &date_format)?;
                    }
                    CellContent::Formula(f) => {
                        ws.write_formula(r, c, Formula::new(f))?;
                    }
                }
            }
        }
        wb.save(path)?;
        Ok(())
    }
}

/// calamine 值 → 模型内容; 空/错误单元格不进模型
fn cell_from_data(value: &Data) -> Option<CellContent> {
    match value {
        Data::Int(i) => Some(CellContent::Number(*i as f64)),
        Data::Float(f) => Some(CellContent::Number(*f)),
        Data::String(s) => Some(CellContent::Text(s.clone())),
        Data::Bool(b) => Some(CellContent::Bool(*b)),
        // 原生日期落为序列号, 读取层能按序列号还原
        Data::DateTime(dt) => Some(CellContent::Number(dt.as_f64())),
        Data::DateTimeIso(s) => Some(CellContent::Text(s.clone())),
        Data::DurationIso(s) => Some(CellContent::Text(s.clone())),
        Data::Error(_) | Data::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_set_refuses_formula_column() {
        let mut sheet = SheetModel::new("Tyre List_1月");
        let formula_cols: BTreeSet<u32> = [7, 8, 9, 10, 11].into_iter().collect();

        let err = sheet
            .set_guarded(2, 9, Some(CellContent::Number(5.0)), &formula_cols)
            .unwrap_err();
        assert!(matches!(err, WriteError::FormulaColumn { col: 9, .. }));
        assert!(sheet.get(2, 9).is_none(), "拒绝写入后模型必须无变更");

        sheet
            .set_guarded(2, 13, Some(CellContent::Number(5.0)), &formula_cols)
            .unwrap();
        assert_eq!(sheet.get(2, 13), Some(&CellContent::Number(5.0)));
    }

    #[test]
    fn test_clear_rows_from_keeps_header() {
        let mut sheet = SheetModel::new("Sales Record");
        sheet.set(1, 1, CellContent::Text("Date".into()));
        sheet.set(2, 1, CellContent::Number(1.0));
        sheet.set(9, 4, CellContent::Text("185/65R15".into()));
        sheet.clear_rows_from(2);
        assert!(sheet.get(1, 1).is_some());
        assert!(sheet.get(2, 1).is_none());
        assert!(sheet.get(9, 4).is_none());
        assert_eq!(sheet.max_row(), 1);
    }

    #[test]
    fn test_formula_text_normalized_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.xlsx");

        let mut model = WorkbookModel::empty();
        let sheet = model.add_sheet("Sheet1");
        // 两种写法入模型, 读回后统一带前导 "="
        sheet.set(2, 8, CellContent::Formula("M2+N2".into()));
        sheet.set(3, 8, CellContent::Formula("=M3+N3".into()));
        model.save(&path).unwrap();

        let loaded = WorkbookModel::load(&path).unwrap();
        let sheet = loaded.sheet("Sheet1").unwrap();
        assert_eq!(sheet.get(2, 8), Some(&CellContent::Formula("=M2+N2".into())));
        assert_eq!(sheet.get(3, 8), Some(&CellContent::Formula("=M3+N3".into())));
    }

    #[test]
    fn test_save_is_byte_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.xlsx");
        let path_b = dir.path().join("b.xlsx");

        let mut model = WorkbookModel::empty();
        let sheet = model.add_sheet("1月");
        sheet.set(5, 13, CellContent::Number(7.0));
        sheet.set(5, 1, CellContent::Text("Samsung".into()));

        model.save(&path_a).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1500));
        model.save(&path_b).unwrap();

        let a = std::fs::read(&path_a).unwrap();
        let b = std::fs::read(&path_b).unwrap();
        assert_eq!(a, b, "同一模型先后保存必须字节一致");
    }

    #[test]
    fn test_clone_sheet() {
        let mut model = WorkbookModel::empty();
        model.add_sheet("1月").set(4, 1, CellContent::Text("Brand".into()));
        model.clone_sheet("1月", "2月").unwrap();
        assert!(model.has_sheet("2月"));
        assert_eq!(
            model.sheet("2月").unwrap().get(4, 1),
            Some(&CellContent::Text("Brand".into()))
        );
    }
}
