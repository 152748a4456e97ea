// ==========================================
// 管件安装估价系统 - 领域模型层
// ==========================================
// 职责: 条目树、派生属性、计价规则、自定义规格
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod attribute;
pub mod custom_item;
pub mod error;
pub mod formula;
pub mod group;
pub mod item;
pub mod pipe_fitting;
pub mod service;
pub mod types;

// 重导出核心类型
pub use attribute::{AttributeName, AttributeSet, AttributeValue, ItemError, ItemErrorKind};
pub use custom_item::{CustomItemCatalog, CustomItemDefinition, Specification, SpecificationValue};
pub use error::{DomainError, DomainResult};
pub use formula::{
    merge_deltas, Condition, ConditionOperation, ConditionOption, DeltaValue, Formula,
    FormulaCalculation, FormulaDelta, OptionSource,
};
pub use group::{Group, ItemFilter};
pub use item::{generate_id, instantiate, Item, ItemKind, CUSTOM_TYPE_PREFIX};
pub use pipe_fitting::{FittingKind, PipeFitting};
pub use service::{Service, ServiceKind};
pub use types::{CalcState, Category, Column, FieldValue, Unit};
