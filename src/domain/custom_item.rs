// ==========================================
// 管件安装估价系统 - 自定义条目规格
// ==========================================
// 职责: 本地定义的条目规格表，按相关列精确匹配，替代远程定价
// 规则: 多条规格同时匹配时取最具体的一条（匹配列最多），并列取先声明者
// ==========================================

use crate::domain::item::Item;
use crate::domain::types::{Category, Column, FieldValue, Unit};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationValue {
    pub column: Column,
    pub value: FieldValue,
}

/// 一条规格: 列值元组 + 固定属性（单件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specification {
    #[serde(default)]
    pub values: Vec<SpecificationValue>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub effort_hours: f64,
    #[serde(default)]
    pub material_price: f64,
}

impl Specification {
    /// 与条目匹配时返回匹配的列数，否则 None
    pub fn matched_len(&self, item: &Item, relevant: &[Column]) -> Option<usize> {
        for spec_value in &self.values {
            if !relevant.contains(&spec_value.column) {
                return None;
            }
            let actual = item.field(spec_value.column)?;
            if !values_equal(&actual, &spec_value.value) {
                return None;
            }
        }
        Some(self.values.len())
    }
}

fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_text() == b.as_text(),
    }
}

/// 自定义条目定义（type_id 以 `custom:` 开头）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomItemDefinition {
    pub type_id: String,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub specifications: Vec<Specification>,
}

impl CustomItemDefinition {
    /// 最具体的匹配规格
    pub fn best_match(&self, item: &Item) -> Option<&Specification> {
        if item.category() != self.category {
            return None;
        }
        let relevant = item.relevant_columns();
        let mut best: Option<(usize, &Specification)> = None;
        for spec in &self.specifications {
            if let Some(len) = spec.matched_len(item, &relevant) {
                if best.map(|(l, _)| len > l).unwrap_or(true) {
                    best = Some((len, spec));
                }
            }
        }
        best.map(|(_, spec)| spec)
    }
}

/// 自定义条目目录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomItemCatalog {
    #[serde(default)]
    pub definitions: Vec<CustomItemDefinition>,
}

impl CustomItemCatalog {
    pub fn new(definitions: Vec<CustomItemDefinition>) -> Self {
        Self { definitions }
    }

    pub fn find(&self, type_id: &str) -> Option<&CustomItemDefinition> {
        self.definitions.iter().find(|d| d.type_id == type_id)
    }

    /// 条目的计量单位
    ///
    /// 自定义条目取定义中的单位（未声明或定义缺失时按件），其余条目按 typeId 分类
    pub fn unit_for(&self, item: &Item) -> Option<Unit> {
        if !item.is_custom() {
            return item.unit();
        }
        let declared = item
            .type_id()
            .and_then(|type_id| self.find(type_id))
            .filter(|definition| definition.category == item.category())
            .and_then(|definition| definition.unit);
        item.unit().map(|_| declared.unwrap_or(Unit::Piece))
    }

    /// 为条目查找匹配的定义与规格
    pub fn find_match(&self, item: &Item) -> Option<(&CustomItemDefinition, &Specification)> {
        let definition = self.find(item.type_id()?)?;
        let spec = definition.best_match(item)?;
        Some((definition, spec))
    }
}
