// ==========================================
// 门店账本同步引擎 - 身份映射层
// ==========================================
// 职责: 在目录记录上建规范化索引, 把发票里松散填写的产品
// 标识（自由文本尺寸/品牌/型号）解析为目录实体引用
// 已知取舍: 尺寸歧义时"先注册者胜", 可能误归, 但保证确定性
// ==========================================

use crate::domain::catalog::{CatalogEntity, EntityId};
use crate::domain::schema::DocumentSchema;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::warn;

fn size_repair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 数字后直接跟尺寸记号字母 r 且无分隔符时补一个 "/"
    // "185/65r15" -> "185/65/r15", "185/65/r15" 保持不变
    RE.get_or_init(|| Regex::new(r"(\d)(r)").unwrap())
}

/// 普通属性规范化: 去首尾空白 + 小写
pub fn normalize_attr(value: Option<&str>) -> String {
    value.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

/// 尺寸字符串规范化: 去全部空白 + 小写 + 分隔符修复
///
/// 人工录入常见不一致: "185/65R15" 与 "185/65/R15" 语义相同,
/// 修复后折叠到同一个键。
pub fn normalize_size(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let s: String = value
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect();
    size_repair_re().replace_all(&s, "$1/$2").into_owned()
}

// ==========================================
// CatalogIndex - 目录索引
// ==========================================
/// 目录记录上的两层查找结构
///
/// - 精确索引: 全部身份属性规范化后拼接为键
/// - 部分索引: 仅主键属性（轮胎: 尺寸; 手机: 品牌+型号）,
///   值为共享该主键的全部候选（保持注册顺序）
pub struct CatalogIndex {
    identity_fields: Vec<String>,
    primary_fields: Vec<usize>,
    size_repair_field: Option<usize>,
    aliases: HashMap<String, String>,
    entities: Vec<CatalogEntity>,
    exact: HashMap<String, EntityId>,
    partial: HashMap<String, Vec<usize>>,
}

impl CatalogIndex {
    /// 从目录记录建索引
    pub fn build(schema: &DocumentSchema, entities: &[CatalogEntity]) -> Self {
        let mut index = CatalogIndex {
            identity_fields: schema.identity_fields.clone(),
            primary_fields: schema.primary_fields.clone(),
            size_repair_field: schema.size_repair_field,
            aliases: schema
                .secondary_aliases
                .iter()
                .cloned()
                .collect(),
            entities: entities.to_vec(),
            exact: HashMap::new(),
            partial: HashMap::new(),
        };

        for (pos, entity) in index.entities.iter().enumerate() {
            let exact_key = index.exact_key(&entity.identity);
            // 先注册者胜: 已存在的键不覆盖, 保证匹配确定性
            index.exact.entry(exact_key).or_insert(entity.id);

            let primary_key = index.primary_key(&entity.identity);
            if !primary_key.is_empty() {
                index.partial.entry(primary_key).or_default().push(pos);
            }
        }
        index
    }

    /// 规范化单个身份属性（按字段应用尺寸修复与别名表）
    fn norm_field(&self, field: usize, value: Option<&str>) -> String {
        let normalized = if self.size_repair_field == Some(field) {
            normalize_size(value)
        } else {
            normalize_attr(value)
        };
        match self.aliases.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }

    fn exact_key(&self, identity: &[Option<String>]) -> String {
        (0..self.identity_fields.len())
            .map(|i| self.norm_field(i, identity.get(i).and_then(|v| v.as_deref())))
            .collect::<Vec<_>>()
            .join("|")
    }

    fn primary_key(&self, identity: &[Option<String>]) -> String {
        self.primary_fields
            .iter()
            .map(|&i| self.norm_field(i, identity.get(i).and_then(|v| v.as_deref())))
            .collect::<Vec<_>>()
            .join("|")
    }

    /// 精确匹配: 全部身份属性一致
    pub fn match_exact(&self, identity: &[Option<String>]) -> Option<EntityId> {
        self.exact.get(&self.exact_key(identity)).copied()
    }

    /// 共享主键的全部候选（注册顺序）
    fn candidates(&self, identity: &[Option<String>]) -> &[usize] {
        let key = self.primary_key(identity);
        if key.is_empty() || key.split('|').all(|p| p.is_empty()) {
            return &[];
        }
        self.partial.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 模糊匹配降级链
    ///
    /// 精确 → 主键 + 前 j 个次属性（j 从多到少） → 主键首候选。
    /// 每级至多一个赢家, 先找到先赢, 对同一输入恒定返回同一实体。
    pub fn match_fuzzy(&self, identity: &[Option<String>]) -> Option<EntityId> {
        if let Some(id) = self.match_exact(identity) {
            return Some(id);
        }

        let candidates = self.candidates(identity);
        if candidates.is_empty() {
            return None;
        }

        let secondary: Vec<usize> = (0..self.identity_fields.len())
            .filter(|i| !self.primary_fields.contains(i))
            .collect();

        // 次属性从多到少逐级放宽（精确级已用掉全部次属性）
        for take in (1..secondary.len()).rev() {
            for &pos in candidates {
                let entity = &self.entities[pos];
                let hit = secondary[..take].iter().all(|&f| {
                    self.norm_field(f, identity.get(f).and_then(|v| v.as_deref()))
                        == self.norm_field(f, entity.identity.get(f).and_then(|v| v.as_deref()))
                });
                if hit {
                    return Some(entity.id);
                }
            }
        }

        // 兜底: 仅主键命中, 取首个注册的候选
        if candidates.len() > 1 {
            warn!(
                主键 = %self.primary_key(identity),
                候选数 = candidates.len(),
                "主键歧义, 按先注册者胜兜底"
            );
        }
        Some(self.entities[candidates[0]].id)
    }

    /// 索引覆盖的实体数
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tyre_entity(id: i64, size: &str, type_: &str, brand: &str, pattern: Option<&str>) -> CatalogEntity {
        CatalogEntity {
            id: EntityId(id),
            identity: vec![
                Some(size.to_string()),
                Some(type_.to_string()),
                Some(brand.to_string()),
                pattern.map(|p| p.to_string()),
            ],
            cost: 0.0,
            prices: BTreeMap::new(),
            source_row: None,
        }
    }

    #[test]
    fn test_normalize_size_collapses_separator_variants() {
        assert_eq!(normalize_size(Some("185/65R15")), "185/65/r15");
        assert_eq!(normalize_size(Some("185/65/R15")), "185/65/r15");
        assert_eq!(normalize_size(Some(" 185/65 R15 ")), "185/65/r15");
        assert_eq!(normalize_size(None), "");
    }

    #[test]
    fn test_normalize_attr() {
        assert_eq!(normalize_attr(Some("  Second Hand ")), "second hand");
        assert_eq!(normalize_attr(None), "");
    }

    #[test]
    fn test_match_exact() {
        let schema = DocumentSchema::tyre();
        let entities = vec![tyre_entity(1, "185/65R15", "New", "Dunlop", Some("SP Sport"))];
        let index = CatalogIndex::build(&schema, &entities);

        let hit = index.match_exact(&[
            Some("185/65/R15".into()),
            Some("new".into()),
            Some("DUNLOP".into()),
            Some("sp sport".into()),
        ]);
        assert_eq!(hit, Some(EntityId(1)));

        let miss = index.match_exact(&[
            Some("185/65R15".into()),
            Some("new".into()),
            Some("Michelin".into()),
            None,
        ]);
        assert_eq!(miss, None);
    }

    #[test]
    fn test_fuzzy_degrades_through_chain() {
        let schema = DocumentSchema::tyre();
        let entities = vec![
            tyre_entity(1, "195/70R14", "New", "Dunlop", Some("A")),
            tyre_entity(2, "195/70R14", "Second Hand", "Dunlop", None),
        ];
        let index = CatalogIndex::build(&schema, &entities);

        // 尺寸 + 类别命中第二条
        let hit = index.match_fuzzy(&[
            Some("195/70/R14".into()),
            Some("Second Hand".into()),
            None,
            None,
        ]);
        assert_eq!(hit, Some(EntityId(2)));

        // 发票用语 "SecondHand" 经别名表折叠后同样命中
        let aliased = index.match_fuzzy(&[
            Some("195/70R14".into()),
            Some("SecondHand".into()),
            None,
            None,
        ]);
        assert_eq!(aliased, Some(EntityId(2)));
    }

    #[test]
    fn test_fuzzy_first_registered_wins_on_ambiguity() {
        let schema = DocumentSchema::tyre();
        let entities = vec![
            tyre_entity(7, "195/70R14", "New", "Dunlop", None),
            tyre_entity(8, "195/70R14", "Second Hand", "Maxtrek", None),
        ];
        let index = CatalogIndex::build(&schema, &entities);

        // 无类别提示: 确定性地返回先注册的候选, 每次调用一致
        for _ in 0..3 {
            let hit = index.match_fuzzy(&[Some("195/70R14".into()), None, None, None]);
            assert_eq!(hit, Some(EntityId(7)));
        }
    }

    #[test]
    fn test_fuzzy_no_candidates() {
        let schema = DocumentSchema::tyre();
        let index = CatalogIndex::build(&schema, &[]);
        assert_eq!(index.match_fuzzy(&[Some("175/70R13".into()), None, None, None]), None);
        assert_eq!(index.match_fuzzy(&[None, None, None, None]), None);
    }
}
