// ==========================================
// 管件安装估价系统 - 引擎层
// ==========================================
// 职责: 批量远程请求收集、表达式求值、计价规则、计算流水线
// 红线: Engine 不拼 SQL，落盘通过 TreeStore 完成
// ==========================================

pub mod calculation;
pub mod collector;
pub mod events;
pub mod expression;
pub mod formula;
pub mod pricing;
pub mod suggestion;

// 重导出核心引擎
pub use calculation::{
    CalculationContext, CalculationEngine, CalculationError, CalculationResult, EstimateDocument,
    RecalcScheduler,
};
pub use collector::{
    BatchCollector, BatchTransport, BoundedCache, CollectorConfig, CollectorError, Identified,
    LookupKind,
};
pub use events::{
    CalculationEvent, CalculationEventPublisher, ChannelEventPublisher, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use expression::{ExpressionError, SymbolTable};
pub use formula::{FormulaApplication, FormulaEngine, FormulaEngineConfig, FormulaError};
pub use pricing::{PricingBatch, PricingCollector, PricingLookup, PricingRequest, PricingResponse};
pub use suggestion::{
    Suggestion, SuggestionCollector, SuggestionLookup, SuggestionRequest, SuggestionResponse,
};
