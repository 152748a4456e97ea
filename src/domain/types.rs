// ==========================================
// 管件安装估价系统 - 领域类型定义
// ==========================================
// 职责: 品类、计算状态、字段列、字段值、计量单位
// 红线: 品类决定具体变体，创建后不可修改
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 品类 (Category)
// ==========================================
// 序列化格式: camelCase (与存储文档一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Group,       // 分组
    PipeFitting, // 管件
    Service,     // 服务
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Group => "group",
            Category::PipeFitting => "pipeFitting",
            Category::Service => "service",
        }
    }

    /// 从字符串解析品类（未知品类返回 None）
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "group" => Some(Category::Group),
            "pipeFitting" => Some(Category::PipeFitting),
            "service" => Some(Category::Service),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 计算状态 (Calculation State)
// ==========================================
// 状态机: Idle -> Calculating -> Calculated (输入不完整时回到 Idle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalcState {
    Idle,        // 未计算
    Calculating, // 计算中
    Calculated,  // 已计算
}

impl fmt::Display for CalcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcState::Idle => write!(f, "IDLE"),
            CalcState::Calculating => write!(f, "CALCULATING"),
            CalcState::Calculated => write!(f, "CALCULATED"),
        }
    }
}

// ==========================================
// 字段列 (Column)
// ==========================================
// 相关列链中的字段名，顺序由各变体决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    TypeId,   // 目录类型
    Material, // 材质
    Dn1,      // 公称直径 1
    Dn2,      // 公称直径 2（变径/支管）
    Quantity, // 数量
    S1,       // 壁厚 1
    S2,       // 壁厚 2
    Dn,       // 服务公称直径
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::TypeId => "typeId",
            Column::Material => "material",
            Column::Dn1 => "dn1",
            Column::Dn2 => "dn2",
            Column::Quantity => "quantity",
            Column::S1 => "s1",
            Column::S2 => "s2",
            Column::Dn => "dn",
        }
    }

    /// 是否为数值列
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Column::TypeId | Column::Material)
    }

    /// 是否为定价必填列（数量总是存在，壁厚可选）
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Column::TypeId | Column::Material | Column::Dn1 | Column::Dn2 | Column::Dn
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 字段值 (Field Value)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// 数值视图（数字字符串会被解析）
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// 文本视图（数字会被格式化）
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Number(n) => serde_json::json!(n),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// 整数值不带小数点输出，保证 "100" 与 100.0 的文本形式一致
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ==========================================
// 计量单位 (Unit)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "m")]
    Meter,
    #[serde(rename = "pcs")]
    Piece,
    #[serde(rename = "h")]
    Hour,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Meter => "m",
            Unit::Piece => "pcs",
            Unit::Hour => "h",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_str() {
        for c in [Category::Group, Category::PipeFitting, Category::Service] {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        assert_eq!(Category::parse("valve"), None);
    }

    #[test]
    fn test_field_value_coercion() {
        assert_eq!(FieldValue::from("100").as_number(), Some(100.0));
        assert_eq!(FieldValue::from(100.0).as_text(), "100");
        assert_eq!(FieldValue::from(2.5).as_text(), "2.5");
        assert_eq!(FieldValue::from("P235").as_number(), None);
    }
}
