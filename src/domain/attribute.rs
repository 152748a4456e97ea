// ==========================================
// 管件安装估价系统 - 派生属性集合
// ==========================================
// 职责: 按名称唯一的有序属性集合（重量、工时、价格、计算标记、规则日志、错误）
// 约束: 属性名是封闭枚举，属性值类型由属性名决定
// ==========================================

use crate::domain::error::DomainError;
use crate::domain::formula::FormulaDelta;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ==========================================
// AttributeName - 属性名
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeName {
    Weight,             // 重量 (kg)
    EffortHours,        // 工时 (h)
    MaterialPrice,      // 材料价
    ManufacturingPrice, // 制作价（拆分计价）
    AssemblyPrice,      // 安装价（拆分计价）
    EffortPrice,        // 人工价（综合费率）
    TotalPrice,         // 总价
    Calculating,        // 计算中标记
    Calculated,         // 已计算标记
    Formulas,           // 已应用规则日志
    Errors,             // 错误列表
}

/// 属性值种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Number,
    Flag,
    Formulas,
    Errors,
}

impl AttributeName {
    /// 参与分组汇总的数值属性（顺序即汇总顺序）
    pub const SUMMED: [AttributeName; 7] = [
        AttributeName::Weight,
        AttributeName::EffortHours,
        AttributeName::MaterialPrice,
        AttributeName::ManufacturingPrice,
        AttributeName::AssemblyPrice,
        AttributeName::EffortPrice,
        AttributeName::TotalPrice,
    ];

    /// 每次计算前需要清空的派生属性
    pub const DERIVED: [AttributeName; 10] = [
        AttributeName::Weight,
        AttributeName::EffortHours,
        AttributeName::MaterialPrice,
        AttributeName::ManufacturingPrice,
        AttributeName::AssemblyPrice,
        AttributeName::EffortPrice,
        AttributeName::TotalPrice,
        AttributeName::Calculated,
        AttributeName::Formulas,
        AttributeName::Errors,
    ];

    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeName::Calculating | AttributeName::Calculated => AttributeKind::Flag,
            AttributeName::Formulas => AttributeKind::Formulas,
            AttributeName::Errors => AttributeKind::Errors,
            _ => AttributeKind::Number,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeName::Weight => "weight",
            AttributeName::EffortHours => "effortHours",
            AttributeName::MaterialPrice => "materialPrice",
            AttributeName::ManufacturingPrice => "manufacturingPrice",
            AttributeName::AssemblyPrice => "assemblyPrice",
            AttributeName::EffortPrice => "effortPrice",
            AttributeName::TotalPrice => "totalPrice",
            AttributeName::Calculating => "calculating",
            AttributeName::Calculated => "calculated",
            AttributeName::Formulas => "formulas",
            AttributeName::Errors => "errors",
        }
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// ItemError - 条目级错误（用户可见）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemErrorKind {
    Formula, // 规则表达式求值失败
    Pricing, // 远程定价失败
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub kind: ItemErrorKind,
    /// 出错来源（规则ID等）
    #[serde(default)]
    pub source_id: Option<String>,
    pub message: String,
}

// ==========================================
// AttributeValue - 属性值
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Number(f64),
    Flag(bool),
    Formulas(Vec<FormulaDelta>),
    Errors(Vec<ItemError>),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Number(_) => AttributeKind::Number,
            AttributeValue::Flag(_) => AttributeKind::Flag,
            AttributeValue::Formulas(_) => AttributeKind::Formulas,
            AttributeValue::Errors(_) => AttributeKind::Errors,
        }
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            AttributeValue::Number(n) => Ok(serde_json::json!(n)),
            AttributeValue::Flag(b) => Ok(serde_json::Value::Bool(*b)),
            AttributeValue::Formulas(list) => serde_json::to_value(list),
            AttributeValue::Errors(list) => serde_json::to_value(list),
        }
    }

    fn from_json(name: AttributeName, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match name.kind() {
            AttributeKind::Number => AttributeValue::Number(serde_json::from_value(value)?),
            AttributeKind::Flag => AttributeValue::Flag(serde_json::from_value(value)?),
            AttributeKind::Formulas => AttributeValue::Formulas(serde_json::from_value(value)?),
            AttributeKind::Errors => AttributeValue::Errors(serde_json::from_value(value)?),
        })
    }
}

// ==========================================
// AttributeSet - 有序属性集合
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    entries: Vec<(AttributeName, AttributeValue)>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeName, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn get(&self, name: AttributeName) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    /// 设置属性值（已存在则原位替换，保留顺序）
    pub fn set(&mut self, name: AttributeName, value: AttributeValue) -> Result<(), DomainError> {
        if name.kind() != value.kind() {
            return Err(DomainError::AttributeType {
                name: name.to_string(),
            });
        }
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: AttributeName) -> Option<AttributeValue> {
        let pos = self.entries.iter().position(|(k, _)| *k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn remove_all(&mut self, names: &[AttributeName]) {
        self.entries.retain(|(k, _)| !names.contains(k));
    }

    pub fn number(&self, name: AttributeName) -> Option<f64> {
        match self.get(name) {
            Some(AttributeValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn set_number(&mut self, name: AttributeName, value: f64) {
        // 数值属性名与 Number 值种类一致，不会失败
        if name.kind() == AttributeKind::Number {
            let _ = self.set(name, AttributeValue::Number(value));
        }
    }

    pub fn flag(&self, name: AttributeName) -> bool {
        matches!(self.get(name), Some(AttributeValue::Flag(true)))
    }

    pub fn set_flag(&mut self, name: AttributeName, value: bool) {
        if name.kind() == AttributeKind::Flag {
            let _ = self.set(name, AttributeValue::Flag(value));
        }
    }

    pub fn formulas(&self) -> &[FormulaDelta] {
        match self.get(AttributeName::Formulas) {
            Some(AttributeValue::Formulas(list)) => list,
            _ => &[],
        }
    }

    pub fn set_formulas(&mut self, deltas: Vec<FormulaDelta>) {
        let _ = self.set(AttributeName::Formulas, AttributeValue::Formulas(deltas));
    }

    pub fn errors(&self) -> &[ItemError] {
        match self.get(AttributeName::Errors) {
            Some(AttributeValue::Errors(list)) => list,
            _ => &[],
        }
    }

    pub fn push_error(&mut self, error: ItemError) {
        let mut list = self.errors().to_vec();
        list.push(error);
        let _ = self.set(AttributeName::Errors, AttributeValue::Errors(list));
    }
}

#[derive(Serialize, Deserialize)]
struct RawAttribute {
    name: AttributeName,
    value: serde_json::Value,
}

impl Serialize for AttributeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;
        let raw = self
            .entries
            .iter()
            .map(|(name, value)| {
                Ok(RawAttribute {
                    name: *name,
                    value: value.to_json().map_err(S::Error::custom)?,
                })
            })
            .collect::<Result<Vec<_>, S::Error>>()?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttributeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<RawAttribute>::deserialize(deserializer)?;
        let mut set = AttributeSet::new();
        for attr in raw {
            let value = AttributeValue::from_json(attr.name, attr.value).map_err(D::Error::custom)?;
            set.set(attr.name, value).map_err(D::Error::custom)?;
        }
        Ok(set)
    }
}
