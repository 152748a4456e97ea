// ==========================================
// 管件安装估价系统 - 计价规则（公式）领域模型
// ==========================================
// 职责: 规则、条件、计算表达式、规则增量记录
// 说明: 条件全部满足 (AND) 时规则生效
// ==========================================

use crate::domain::attribute::AttributeName;
use crate::domain::types::{Column, FieldValue};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ConditionOperation - 条件运算
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperation {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ConditionOperation {
    /// 下界运算 (gt/gte)
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, ConditionOperation::Gt | ConditionOperation::Gte)
    }

    /// 上界运算 (lt/lte)
    pub fn is_upper_bound(&self) -> bool {
        matches!(self, ConditionOperation::Lt | ConditionOperation::Lte)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperation::Eq => "eq",
            ConditionOperation::Neq => "neq",
            ConditionOperation::Gt => "gt",
            ConditionOperation::Gte => "gte",
            ConditionOperation::Lt => "lt",
            ConditionOperation::Lte => "lte",
        }
    }
}

impl fmt::Display for ConditionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// ConditionOption - 条件取值项
// ==========================================
// 每个取值项带来源标记：字段或派生属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOption {
    TypeId,
    Material,
    Dn1,
    S1,
    Dn2,
    S2,
    Dn,
    Quantity,
    Weight,
    EffortHours,
    MaterialPrice,
}

/// 条件取值来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSource {
    Field(Column),
    Attribute(AttributeName),
}

impl ConditionOption {
    pub fn source(&self) -> OptionSource {
        match self {
            ConditionOption::TypeId => OptionSource::Field(Column::TypeId),
            ConditionOption::Material => OptionSource::Field(Column::Material),
            ConditionOption::Dn1 => OptionSource::Field(Column::Dn1),
            ConditionOption::S1 => OptionSource::Field(Column::S1),
            ConditionOption::Dn2 => OptionSource::Field(Column::Dn2),
            ConditionOption::S2 => OptionSource::Field(Column::S2),
            ConditionOption::Dn => OptionSource::Field(Column::Dn),
            ConditionOption::Quantity => OptionSource::Field(Column::Quantity),
            ConditionOption::Weight => OptionSource::Attribute(AttributeName::Weight),
            ConditionOption::EffortHours => OptionSource::Attribute(AttributeName::EffortHours),
            ConditionOption::MaterialPrice => {
                OptionSource::Attribute(AttributeName::MaterialPrice)
            }
        }
    }
}

// ==========================================
// Condition - 条件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub option: ConditionOption,
    pub operation: ConditionOperation,
    /// 比较值（为空表示尚在编辑，不参与重叠校验）
    #[serde(default)]
    pub value: Option<FieldValue>,
}

impl Condition {
    pub fn new(option: ConditionOption, operation: ConditionOperation, value: FieldValue) -> Self {
        Self {
            option,
            operation,
            value: Some(value),
        }
    }
}

// ==========================================
// FormulaCalculation - 规则计算表达式
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaCalculation {
    /// 工时表达式
    #[serde(default)]
    pub effort_hours: Option<String>,
    /// 材料价表达式
    #[serde(default)]
    pub material_price: Option<String>,
}

// ==========================================
// Formula - 计价规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub calculation: FormulaCalculation,
}

fn default_active() -> bool {
    true
}

impl Formula {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
            conditions: Vec::new(),
            calculation: FormulaCalculation::default(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_effort_hours(mut self, expression: impl Into<String>) -> Self {
        self.calculation.effort_hours = Some(expression.into());
        self
    }

    pub fn with_material_price(mut self, expression: impl Into<String>) -> Self {
        self.calculation.material_price = Some(expression.into());
        self
    }
}

// ==========================================
// DeltaValue / FormulaDelta - 规则增量
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaValue {
    pub before: f64,
    pub after: f64,
    pub value: f64,
}

impl DeltaValue {
    pub fn new(before: f64, after: f64) -> Self {
        Self {
            before,
            after,
            value: after - before,
        }
    }

    pub fn accumulate(&mut self, other: &DeltaValue) {
        self.before += other.before;
        self.after += other.after;
        self.value += other.value;
    }
}

/// 单条规则对一个条目（或汇总后对一个分组）的影响
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaDelta {
    pub formula_id: String,
    pub name: String,
    pub effort_hours: DeltaValue,
    pub material_price: DeltaValue,
}

impl FormulaDelta {
    pub fn accumulate(&mut self, other: &FormulaDelta) {
        self.effort_hours.accumulate(&other.effort_hours);
        self.material_price.accumulate(&other.material_price);
    }
}

/// 按规则ID合并增量：首次出现深拷贝，后续出现累加
pub fn merge_deltas<'a>(deltas: impl IntoIterator<Item = &'a FormulaDelta>) -> Vec<FormulaDelta> {
    let mut merged: Vec<FormulaDelta> = Vec::new();
    for delta in deltas {
        match merged.iter_mut().find(|d| d.formula_id == delta.formula_id) {
            Some(existing) => existing.accumulate(delta),
            None => merged.push(delta.clone()),
        }
    }
    merged
}
