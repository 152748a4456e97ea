// ==========================================
// 管件安装估价系统 - 核心库
// ==========================================
// 职责: 条目树建模、远程计价批量请求、计价规则、汇总计算
// 技术栈: Rust + Tokio + SQLite
// 系统定位: 估价编辑器的计算后端 (界面层不在本库)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 条目树与属性
pub mod domain;

// 数据仓储层 - 条目树持久化
pub mod repository;

// 引擎层 - 批量请求/规则/计算流水线
pub mod engine;

// 配置层 - 计算设置与规则
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CalcState, Category, Column, FieldValue, Unit};

// 领域实体
pub use domain::{
    AttributeName, AttributeSet, CustomItemCatalog, DomainError, Formula, Group, Item, ItemError,
    ItemFilter, PipeFitting, Service,
};

// 引擎
pub use engine::{
    BatchCollector, BatchTransport, CalculationContext, CalculationEngine, CalculationError,
    CalculationEvent, CollectorConfig, CollectorError, EstimateDocument, FormulaEngine,
    PricingCollector, RecalcScheduler, SuggestionCollector,
};

// 配置与存储
pub use config::{CalculationSettings, ConfigManager};
pub use repository::{RepositoryError, SqliteTreeStore, TreeStore};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "管件安装估价系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
