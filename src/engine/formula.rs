// ==========================================
// 管件安装估价系统 - 计价规则引擎
// ==========================================
// 职责:
// - 条件求值: 按取值来源取比较值，规则值按比较值类型转换后比较
// - 规则应用: 按声明顺序应用全部匹配规则，记录前后增量
// - 编辑期校验: 条件区间重叠检测 + 表达式语法检查
// 红线: 单条规则求值失败只记录到条目错误列表，不影响其他规则
// ==========================================

mod overlap;


pub use overlap::{approx_eq, conditions_overlap, find_overlaps, ConditionOverlap};

use crate::domain::attribute::{AttributeName, ItemError, ItemErrorKind};
use crate::domain::formula::{
    Condition, ConditionOperation, DeltaValue, Formula, FormulaDelta, OptionSource,
};
use crate::domain::item::Item;
use crate::domain::types::FieldValue;
use crate::engine::expression::{self, ExpressionError, SymbolTable};
use std::cmp::Ordering;
use thiserror::Error;

/// 规则编辑期校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("规则 {formula_id} 存在重叠条件: {}", format_overlaps(.overlaps))]
    OverlappingConditions {
        formula_id: String,
        overlaps: Vec<ConditionOverlap>,
    },

    #[error("规则 {formula_id} 的 {field} 表达式无效: {source}")]
    InvalidExpression {
        formula_id: String,
        field: String,
        source: ExpressionError,
    },
}

fn format_overlaps(overlaps: &[ConditionOverlap]) -> String {
    overlaps
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// 规则引擎配置
#[derive(Debug, Clone)]
pub struct FormulaEngineConfig {
    /// 浮点比较容差（相对）
    pub float_tolerance: f64,
}

impl Default for FormulaEngineConfig {
    fn default() -> Self {
        Self {
            float_tolerance: 1e-9,
        }
    }
}

/// 规则应用结果
#[derive(Debug, Clone, Default)]
pub struct FormulaApplication {
    pub applied: Vec<FormulaDelta>,
    pub errors: Vec<ItemError>,
}

/// FormulaEngine - 计价规则引擎
pub struct FormulaEngine {
    config: FormulaEngineConfig,
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new(FormulaEngineConfig::default())
    }
}

impl FormulaEngine {
    pub fn new(config: FormulaEngineConfig) -> Self {
        Self { config }
    }

    // ==========================================
    // 条件求值
    // ==========================================

    /// 取条件比较值（字段或派生属性）
    fn comparand(item: &Item, condition: &Condition) -> Option<FieldValue> {
        match condition.option.source() {
            OptionSource::Field(column) => item.field(column),
            OptionSource::Attribute(name) => {
                item.attributes().number(name).map(FieldValue::Number)
            }
        }
    }

    /// 单个条件是否成立
    pub fn condition_matches(&self, item: &Item, condition: &Condition) -> bool {
        let (actual, expected) = match (Self::comparand(item, condition), &condition.value) {
            (Some(a), Some(e)) => (a, e),
            _ => return false,
        };

        let ordering = match actual {
            FieldValue::Number(a) => {
                // 规则值转换为数值（"100" -> 100）
                let e = match expected.as_number() {
                    Some(e) => e,
                    None => return false,
                };
                if approx_eq(a, e, self.config.float_tolerance) {
                    Ordering::Equal
                } else if a < e {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            FieldValue::Text(ref a) => a.as_str().cmp(expected.as_text().as_str()),
        };

        match condition.operation {
            ConditionOperation::Eq => ordering == Ordering::Equal,
            ConditionOperation::Neq => ordering != Ordering::Equal,
            ConditionOperation::Gt => ordering == Ordering::Greater,
            ConditionOperation::Gte => ordering != Ordering::Less,
            ConditionOperation::Lt => ordering == Ordering::Less,
            ConditionOperation::Lte => ordering != Ordering::Greater,
        }
    }

    /// 规则是否适用（启用且全部条件成立）
    pub fn formula_matches(&self, item: &Item, formula: &Formula) -> bool {
        formula.active
            && formula
                .conditions
                .iter()
                .all(|c| self.condition_matches(item, c))
    }

    // ==========================================
    // 规则应用
    // ==========================================

    /// 按声明顺序应用所有匹配规则，增量与错误同时写入条目属性
    pub fn apply(&self, item: &mut Item, formulas: &[Formula]) -> FormulaApplication {
        let mut result = FormulaApplication::default();

        for formula in formulas {
            if !self.formula_matches(item, formula) {
                continue;
            }
            match Self::evaluate_formula(item, formula) {
                Ok(delta) => {
                    let attrs = item.attributes_mut();
                    if formula.calculation.effort_hours.is_some() {
                        attrs.set_number(AttributeName::EffortHours, delta.effort_hours.after);
                    }
                    if formula.calculation.material_price.is_some() {
                        attrs.set_number(AttributeName::MaterialPrice, delta.material_price.after);
                    }
                    tracing::debug!(
                        "规则已应用: item_id={}, formula_id={}, effort_delta={}, price_delta={}",
                        item.id(),
                        formula.id,
                        delta.effort_hours.value,
                        delta.material_price.value
                    );
                    result.applied.push(delta);
                }
                Err((field, e)) => {
                    tracing::warn!(
                        "规则求值失败: item_id={}, formula_id={}, field={}, error={}",
                        item.id(),
                        formula.id,
                        field,
                        e
                    );
                    result.errors.push(ItemError {
                        kind: ItemErrorKind::Formula,
                        source_id: Some(formula.id.clone()),
                        message: format!("{} ({}): {}", formula.name, field, e),
                    });
                }
            }
        }

        if !result.applied.is_empty() {
            item.attributes_mut().set_formulas(result.applied.clone());
        }
        for error in &result.errors {
            item.attributes_mut().push_error(error.clone());
        }
        result
    }

    /// 以规则应用前的条目状态求值两条表达式（任一失败则整条规则不生效）
    fn evaluate_formula(
        item: &Item,
        formula: &Formula,
    ) -> Result<FormulaDelta, (&'static str, ExpressionError)> {
        let symbols = SymbolTable::from_item(item);
        let attrs = item.attributes();
        let effort_before = attrs.number(AttributeName::EffortHours).unwrap_or(0.0);
        let price_before = attrs.number(AttributeName::MaterialPrice).unwrap_or(0.0);

        let effort_after = match non_blank(&formula.calculation.effort_hours) {
            Some(src) => expression::evaluate(src, &symbols).map_err(|e| ("effortHours", e))?,
            None => effort_before,
        };
        let price_after = match non_blank(&formula.calculation.material_price) {
            Some(src) => {
                expression::evaluate(src, &symbols).map_err(|e| ("materialPrice", e))?
            }
            None => price_before,
        };

        Ok(FormulaDelta {
            formula_id: formula.id.clone(),
            name: formula.name.clone(),
            effort_hours: DeltaValue::new(effort_before, effort_after),
            material_price: DeltaValue::new(price_before, price_after),
        })
    }

    // ==========================================
    // 编辑期校验
    // ==========================================

    /// 条件两两重叠检测
    pub fn find_overlaps(&self, conditions: &[Condition]) -> Vec<ConditionOverlap> {
        find_overlaps(conditions, self.config.float_tolerance)
    }

    /// 校验规则：条件不重叠，表达式语法正确
    pub fn validate(&self, formula: &Formula) -> Result<(), FormulaError> {
        let overlaps = self.find_overlaps(&formula.conditions);
        if !overlaps.is_empty() {
            return Err(FormulaError::OverlappingConditions {
                formula_id: formula.id.clone(),
                overlaps,
            });
        }
        for (field, src) in [
            ("effortHours", &formula.calculation.effort_hours),
            ("materialPrice", &formula.calculation.material_price),
        ] {
            if let Some(src) = non_blank(src) {
                expression::parse(src).map_err(|source| FormulaError::InvalidExpression {
                    formula_id: formula.id.clone(),
                    field: field.to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

fn non_blank(src: &Option<String>) -> Option<&str> {
    src.as_deref().filter(|s| !s.trim().is_empty())
}
