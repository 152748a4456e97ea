// ==========================================
// 管件安装估价系统 - 计算引擎
// ==========================================
// 职责: 叶子定价（自定义规格 / 远程定价）、规则应用、拆分计价展开、
//       分组自底向上汇总与规则增量合并、根节点落盘
// 状态机: Idle -> Calculating -> Calculated（输入不完整时回到 Idle）
// 红线:
// - 进入 Calculating 时整条祖先链同步标记
// - 分组只在全部子条目计算结束后汇总（全部等待，不取首个）
// - 规则/定价错误只记录到条目，不中断整体计算
// ==========================================

mod aggregate;
mod core;
mod leaf;
mod ops;
mod scheduler;


pub use aggregate::{aggregate_group, aggregate_subtree};
pub use scheduler::RecalcScheduler;

use crate::config::CalculationSettings;
use crate::domain::custom_item::CustomItemCatalog;
use crate::domain::error::DomainError;
use crate::domain::formula::Formula;
use crate::domain::item::Item;
use crate::domain::types::Unit;
use crate::engine::events::OptionalEventPublisher;
use crate::engine::formula::FormulaEngine;
use crate::engine::pricing::PricingCollector;
use crate::repository::{RepositoryError, TreeStore};
use std::sync::Arc;
use thiserror::Error;

/// 计算引擎错误（仅结构性错误与落盘失败，条目级错误记录在条目属性中）
#[derive(Error, Debug)]
pub enum CalculationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("条目树保存失败: {0}")]
    Persist(#[from] RepositoryError),
}

pub type CalculationResult<T> = Result<T, CalculationError>;

// ==========================================
// CalculationContext - 计算上下文
// ==========================================
/// 显式传入的计算上下文（当前设置、规则、自定义条目）
#[derive(Debug, Clone, Default)]
pub struct CalculationContext {
    pub settings: CalculationSettings,
    pub formulas: Vec<Formula>,
    pub custom_items: CustomItemCatalog,
}

// ==========================================
// EstimateDocument - 估价文档
// ==========================================
#[derive(Debug, Clone)]
pub struct EstimateDocument {
    pub id: String,
    pub root: Item,
    pub context: CalculationContext,
}

impl EstimateDocument {
    pub fn new(id: impl Into<String>, root: Item, context: CalculationContext) -> Self {
        Self {
            id: id.into(),
            root,
            context,
        }
    }

    /// 条目计量单位（自定义条目按当前目录解析）
    pub fn unit_of(&self, item_id: &str) -> Option<Unit> {
        let item = self.root.get_item(item_id, None)?;
        self.context.custom_items.unit_for(item)
    }
}

// ==========================================
// CalculationEngine - 计算引擎
// ==========================================
pub struct CalculationEngine {
    // 远程定价（批量收集器）
    pricing: PricingCollector,
    // 规则引擎
    formula_engine: FormulaEngine,
    // 根节点落盘（外部协作方）
    store: Arc<dyn TreeStore>,
    // 状态变更事件
    event_publisher: OptionalEventPublisher,
}
