// ==========================================
// 管件安装估价系统 - 服务 (Service)
// ==========================================
// 职责: 服务字段、类型号区间分类、相关列链
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::pipe_fitting::{default_quantity, numeric, required_numeric};
use crate::domain::types::{Column, FieldValue, Unit};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Hourly,        // [5000, 6000) 按工时计
    SizeDependent, // [6000, 7000) 依赖公称直径
    Flat,          // 其余目录类型，按件计
}

impl ServiceKind {
    pub fn from_type_id(type_id: &str) -> Option<Self> {
        let n: i64 = type_id.trim().parse().ok()?;
        Some(match n {
            5000..=5999 => ServiceKind::Hourly,
            6000..=6999 => ServiceKind::SizeDependent,
            _ => ServiceKind::Flat,
        })
    }

    pub fn unit(&self) -> Unit {
        match self {
            ServiceKind::Hourly => Unit::Hour,
            _ => Unit::Piece,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub dn: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            dn: None,
            quantity: default_quantity(),
        }
    }
}

pub const SERVICE_COLUMNS: [Column; 3] = [Column::TypeId, Column::Dn, Column::Quantity];

impl Service {
    /// 相关列链: typeId, [dn], quantity
    pub fn relevant_columns(kind: Option<ServiceKind>) -> Vec<Column> {
        let mut columns = vec![Column::TypeId];
        if kind == Some(ServiceKind::SizeDependent) {
            columns.push(Column::Dn);
        }
        columns.push(Column::Quantity);
        columns
    }

    pub fn field(&self, column: Column) -> Option<FieldValue> {
        match column {
            Column::Dn => self.dn.map(FieldValue::Number),
            Column::Quantity => Some(FieldValue::Number(self.quantity)),
            _ => None,
        }
    }

    pub fn set_field(&mut self, column: Column, value: Option<FieldValue>) -> DomainResult<()> {
        match column {
            Column::Dn => self.dn = numeric(column, value)?,
            Column::Quantity => self.quantity = required_numeric(column, value)?,
            _ => {
                return Err(DomainError::ColumnNotApplicable {
                    column: column.to_string(),
                    category: "service".to_string(),
                })
            }
        }
        Ok(())
    }
}
