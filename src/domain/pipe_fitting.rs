// ==========================================
// 管件安装估价系统 - 管件 (PipeFitting)
// ==========================================
// 职责: 管件字段、类型号区间分类、相关列链
// 规则: 类型号数值区间决定计量单位以及是否需要第二组规格 (dn2/s2)
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::types::{Column, FieldValue, Unit};
use serde::{Deserialize, Serialize};

// ==========================================
// FittingKind - 管件类型区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FittingKind {
    Pipe,     // [1000, 2000) 直管，按米计
    Fitting,  // [2000, 3000) 标准管件
    Reduced,  // [3000, 4000) 变径管件
    Extended, // [4000, 5000) 支管/扩展管件
    Other,    // 其余目录类型
}

impl FittingKind {
    /// 按类型号区间分类（非数字类型号返回 None）
    pub fn from_type_id(type_id: &str) -> Option<Self> {
        let n: i64 = type_id.trim().parse().ok()?;
        Some(match n {
            1000..=1999 => FittingKind::Pipe,
            2000..=2999 => FittingKind::Fitting,
            3000..=3999 => FittingKind::Reduced,
            4000..=4999 => FittingKind::Extended,
            _ => FittingKind::Other,
        })
    }

    /// 是否带第二组规格 (dn2/s2)
    pub fn has_second_size(&self) -> bool {
        matches!(self, FittingKind::Reduced | FittingKind::Extended)
    }

    pub fn unit(&self) -> Unit {
        match self {
            FittingKind::Pipe => Unit::Meter,
            _ => Unit::Piece,
        }
    }
}

// ==========================================
// PipeFitting - 管件字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeFitting {
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub dn1: Option<f64>,
    #[serde(default)]
    pub s1: Option<f64>,
    #[serde(default)]
    pub dn2: Option<f64>,
    #[serde(default)]
    pub s2: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

pub(crate) fn default_quantity() -> f64 {
    1.0
}

impl Default for PipeFitting {
    fn default() -> Self {
        Self {
            material: None,
            dn1: None,
            s1: None,
            dn2: None,
            s2: None,
            quantity: default_quantity(),
        }
    }
}

/// 管件可编辑的全部列
pub const PIPE_FITTING_COLUMNS: [Column; 7] = [
    Column::TypeId,
    Column::Material,
    Column::Dn1,
    Column::Dn2,
    Column::Quantity,
    Column::S1,
    Column::S2,
];

impl PipeFitting {
    /// 相关列链: typeId, material, dn1, [dn2], quantity, s1, [s2]
    pub fn relevant_columns(kind: Option<FittingKind>) -> Vec<Column> {
        let second = kind.map(|k| k.has_second_size()).unwrap_or(false);
        let mut columns = vec![Column::TypeId, Column::Material, Column::Dn1];
        if second {
            columns.push(Column::Dn2);
        }
        columns.push(Column::Quantity);
        columns.push(Column::S1);
        if second {
            columns.push(Column::S2);
        }
        columns
    }

    pub fn field(&self, column: Column) -> Option<FieldValue> {
        match column {
            Column::Material => self.material.clone().map(FieldValue::Text),
            Column::Dn1 => self.dn1.map(FieldValue::Number),
            Column::S1 => self.s1.map(FieldValue::Number),
            Column::Dn2 => self.dn2.map(FieldValue::Number),
            Column::S2 => self.s2.map(FieldValue::Number),
            Column::Quantity => Some(FieldValue::Number(self.quantity)),
            Column::TypeId | Column::Dn => None,
        }
    }

    pub fn set_field(&mut self, column: Column, value: Option<FieldValue>) -> DomainResult<()> {
        match column {
            Column::Material => self.material = value.map(|v| v.as_text()),
            Column::Dn1 => self.dn1 = numeric(column, value)?,
            Column::S1 => self.s1 = numeric(column, value)?,
            Column::Dn2 => self.dn2 = numeric(column, value)?,
            Column::S2 => self.s2 = numeric(column, value)?,
            Column::Quantity => self.quantity = required_numeric(column, value)?,
            Column::TypeId | Column::Dn => {
                return Err(DomainError::ColumnNotApplicable {
                    column: column.to_string(),
                    category: "pipeFitting".to_string(),
                })
            }
        }
        Ok(())
    }
}

/// 可空数值列的取值转换（数字字符串会被解析）
pub(crate) fn numeric(column: Column, value: Option<FieldValue>) -> DomainResult<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) => v
            .as_number()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| DomainError::InvalidFieldValue {
                column: column.to_string(),
                message: format!("需要数值, 实际 '{}'", v),
            }),
    }
}

pub(crate) fn required_numeric(column: Column, value: Option<FieldValue>) -> DomainResult<f64> {
    numeric(column, value)?.ok_or_else(|| DomainError::InvalidFieldValue {
        column: column.to_string(),
        message: "不可为空".to_string(),
    })
}
