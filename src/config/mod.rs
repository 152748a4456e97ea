// ==========================================
// 管件安装估价系统 - 配置层
// ==========================================
// 职责: 计算设置、计价规则、自定义条目的持久化配置
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod settings;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use settings::{CalculationSettings, SplitPricing};
