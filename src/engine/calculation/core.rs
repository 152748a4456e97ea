use super::{CalculationEngine, CalculationResult, EstimateDocument};
use crate::domain::attribute::AttributeName;
use crate::domain::error::DomainError;
use crate::domain::group::ItemFilter;
use crate::domain::item::Item;
use crate::domain::types::CalcState;
use crate::engine::calculation::aggregate::{aggregate_group, aggregate_subtree};
use crate::engine::events::{
    CalculationEvent, CalculationEventPublisher, OptionalEventPublisher,
};
use crate::engine::formula::FormulaEngine;
use crate::engine::pricing::PricingCollector;
use crate::repository::TreeStore;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;

impl CalculationEngine {
    /// 创建新的 CalculationEngine 实例
    pub fn new(
        pricing: PricingCollector,
        store: Arc<dyn TreeStore>,
        event_publisher: Option<Arc<dyn CalculationEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };

        Self {
            pricing,
            formula_engine: FormulaEngine::default(),
            store,
            event_publisher,
        }
    }

    /// 替换规则引擎（自定义浮点容差等）
    pub fn with_formula_engine(mut self, formula_engine: FormulaEngine) -> Self {
        self.formula_engine = formula_engine;
        self
    }

    pub fn pricing(&self) -> &PricingCollector {
        &self.pricing
    }

    pub fn formula_engine(&self) -> &FormulaEngine {
        &self.formula_engine
    }

    // ==========================================
    // 重算入口
    // ==========================================

    /// 重算单个条目（分组则重算其全部叶子），然后汇总祖先链并落盘
    ///
    /// # 返回
    /// - 条目计算后的状态
    pub async fn recalculate_item(
        &self,
        doc: &mut EstimateDocument,
        item_id: &str,
    ) -> CalculationResult<CalcState> {
        let started = Instant::now();
        let ancestors = doc
            .root
            .ancestors(item_id)
            .ok_or_else(|| DomainError::ItemNotFound(item_id.to_string()))?;

        // 1. 标记计算中：目标子树 + 祖先链
        let leaves: Vec<Item> = {
            let target = doc
                .root
                .get_item_mut(item_id)
                .ok_or_else(|| DomainError::ItemNotFound(item_id.to_string()))?;
            target.for_each_mut(&mut |item| self.mark_calculating(item));
            target
                .get_items(&ItemFilter::leaves())
                .into_iter()
                .cloned()
                .collect()
        };
        let path: Vec<String> = ancestors.iter().rev().cloned().collect();
        doc.root
            .visit_path_mut(&path, true, &mut |item| self.mark_calculating(item));

        // 2. 叶子并发计算（快照），全部结束后再写回
        let context = &doc.context;
        let results = join_all(
            leaves
                .into_iter()
                .map(|leaf| self.calculate_leaf(leaf, context)),
        )
        .await;

        for result in results {
            match doc.root.get_item_mut(result.id()) {
                Some(slot) => {
                    *slot.attributes_mut() = result.attributes().clone();
                    self.publish(slot, CalcState::Calculating);
                }
                None => tracing::warn!("叶子计算结果无对应条目（已被移除）: item_id={}", result.id()),
            }
        }

        // 3. 汇总：目标子树自底向上，然后祖先链由近及远
        if let Some(target) = doc.root.get_item_mut(item_id) {
            if target.is_group() {
                aggregate_subtree(target, &mut |group, previous| {
                    self.publish(group, previous);
                });
            }
        }
        self.refresh_ancestors(&mut doc.root, &ancestors);

        // 4. 根节点落盘
        let revision = self.store.save_tree(&doc.id, &doc.root)?;

        let state = doc
            .root
            .get_item(item_id, None)
            .map(|i| i.calc_state())
            .unwrap_or(CalcState::Idle);
        tracing::info!(
            "条目重算完成: document_id={}, item_id={}, state={}, revision={}, elapsed_ms={}",
            doc.id,
            item_id,
            state,
            revision,
            started.elapsed().as_millis()
        );
        Ok(state)
    }

    /// 全树重算（设置/规则变更后调用）
    pub async fn recalculate_all(&self, doc: &mut EstimateDocument) -> CalculationResult<CalcState> {
        let root_id = doc.root.id().to_string();
        self.recalculate_item(doc, &root_id).await
    }

    /// 仅重新汇总全部分组（不重新定价叶子）并落盘
    pub fn refresh_groups(&self, doc: &mut EstimateDocument) -> CalculationResult<CalcState> {
        aggregate_subtree(&mut doc.root, &mut |group, previous| {
            self.publish(group, previous);
        });
        self.store.save_tree(&doc.id, &doc.root)?;
        Ok(doc.root.calc_state())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 由近及远汇总祖先分组（ancestors 按最近的父分组在前）
    pub(super) fn refresh_ancestors(&self, root: &mut Item, ancestors: &[String]) {
        let path: Vec<String> = ancestors.iter().rev().cloned().collect();
        root.visit_path_mut(&path, true, &mut |group| {
            let previous = aggregate_group(group);
            self.publish(group, previous);
        });
    }

    fn mark_calculating(&self, item: &mut Item) {
        let previous = item.calc_state();
        item.attributes_mut().set_flag(AttributeName::Calculating, true);
        self.publish(item, previous);
    }

    /// 状态发生变化时发布事件
    pub(super) fn publish(&self, item: &Item, previous: CalcState) {
        let current = item.calc_state();
        if current != previous {
            self.event_publisher.publish(CalculationEvent::transition(
                item.id(),
                item.category(),
                previous,
                current,
            ));
        }
    }
}
