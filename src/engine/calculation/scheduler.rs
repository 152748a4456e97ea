// ==========================================
// 设置变更重算调度
// ==========================================
// 连续修改设置/规则时只执行最后一次全树重算
// 实现: 代次计数 + 定时等待，等待结束时代次已变化则放弃
// ==========================================

use super::{CalculationContext, CalculationEngine, CalculationResult, EstimateDocument};
use crate::config::CalculationSettings;
use crate::domain::custom_item::CustomItemCatalog;
use crate::domain::formula::Formula;
use crate::domain::types::CalcState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// 默认防抖时长
pub const DEFAULT_RECALC_DEBOUNCE: Duration = Duration::from_millis(300);

pub struct RecalcScheduler {
    engine: Arc<CalculationEngine>,
    document: Arc<Mutex<EstimateDocument>>,
    debounce: Duration,
    generation: Arc<AtomicU64>,
}

impl RecalcScheduler {
    pub fn new(engine: Arc<CalculationEngine>, document: Arc<Mutex<EstimateDocument>>) -> Self {
        Self::with_debounce(engine, document, DEFAULT_RECALC_DEBOUNCE)
    }

    pub fn with_debounce(
        engine: Arc<CalculationEngine>,
        document: Arc<Mutex<EstimateDocument>>,
        debounce: Duration,
    ) -> Self {
        Self {
            engine,
            document,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn document(&self) -> Arc<Mutex<EstimateDocument>> {
        self.document.clone()
    }

    /// 调度一次全树重算
    ///
    /// # 返回
    /// - `Ok(Some(state))`: 本次调度执行了重算
    /// - `Ok(None)`: 被后续调度取代，未执行
    pub fn schedule(&self) -> JoinHandle<CalculationResult<Option<CalcState>>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = self.generation.clone();
        let engine = self.engine.clone();
        let document = self.document.clone();
        let debounce = self.debounce;

        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if latest.load(Ordering::SeqCst) != generation {
                tracing::debug!("全树重算已被后续调度取代: generation={}", generation);
                return Ok(None);
            }
            let mut doc = document.lock().await;
            engine.recalculate_all(&mut doc).await.map(Some)
        })
    }

    /// 更新计算设置并调度重算
    pub async fn update_settings(
        &self,
        settings: CalculationSettings,
    ) -> JoinHandle<CalculationResult<Option<CalcState>>> {
        self.update_context(|ctx| ctx.settings = settings).await
    }

    /// 更新计价规则并调度重算
    pub async fn update_formulas(
        &self,
        formulas: Vec<Formula>,
    ) -> JoinHandle<CalculationResult<Option<CalcState>>> {
        self.update_context(|ctx| ctx.formulas = formulas).await
    }

    /// 更新自定义条目并调度重算
    pub async fn update_custom_items(
        &self,
        catalog: CustomItemCatalog,
    ) -> JoinHandle<CalculationResult<Option<CalcState>>> {
        self.update_context(|ctx| ctx.custom_items = catalog).await
    }

    async fn update_context(
        &self,
        apply: impl FnOnce(&mut CalculationContext),
    ) -> JoinHandle<CalculationResult<Option<CalcState>>> {
        {
            let mut doc = self.document.lock().await;
            apply(&mut doc.context);
        }
        self.schedule()
    }
}
