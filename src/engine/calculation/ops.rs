// ==========================================
// 编辑操作 + 联动重算
// ==========================================
// 每个编辑操作完成树变更后触发相应的重算/汇总，并落盘
// 结构性错误（品类不符、ID不存在、成环）直接返回，树保持不变
// ==========================================

use super::{CalculationEngine, CalculationResult, EstimateDocument};
use crate::domain::error::DomainError;
use crate::domain::item::Item;
use crate::domain::types::{CalcState, Column, FieldValue};

impl CalculationEngine {
    /// 修改字段后重算该条目
    pub async fn update_field(
        &self,
        doc: &mut EstimateDocument,
        item_id: &str,
        column: Column,
        value: Option<FieldValue>,
    ) -> CalculationResult<CalcState> {
        let item = doc
            .root
            .get_item_mut(item_id)
            .ok_or_else(|| DomainError::ItemNotFound(item_id.to_string()))?;
        item.set_field(column, value)?;
        self.recalculate_item(doc, item_id).await
    }

    /// 插入条目并计算（返回新条目ID）
    pub async fn add_item(
        &self,
        doc: &mut EstimateDocument,
        group_id: &str,
        item: Item,
        after_id: Option<&str>,
    ) -> CalculationResult<String> {
        let id = item.id().to_string();
        doc.root.insert_into(group_id, item, after_id)?;
        self.recalculate_item(doc, &id).await?;
        Ok(id)
    }

    /// 移除条目并重新汇总原祖先链
    pub fn remove_item(&self, doc: &mut EstimateDocument, item_id: &str) -> CalculationResult<Item> {
        let ancestors = doc
            .root
            .ancestors(item_id)
            .ok_or_else(|| DomainError::ItemNotFound(item_id.to_string()))?;
        let removed = doc.root.remove_item(item_id)?;
        self.refresh_ancestors(&mut doc.root, &ancestors);
        self.store.save_tree(&doc.id, &doc.root)?;
        Ok(removed)
    }

    /// 复制条目（快照一致，无需重新定价），返回新ID
    pub fn duplicate_item(&self, doc: &mut EstimateDocument, item_id: &str) -> CalculationResult<String> {
        let new_id = doc.root.duplicate_item(item_id)?;
        let ancestors = doc.root.ancestors(&new_id).unwrap_or_default();
        self.refresh_ancestors(&mut doc.root, &ancestors);
        self.store.save_tree(&doc.id, &doc.root)?;
        Ok(new_id)
    }

    /// 移动条目，新旧两条祖先链都重新汇总
    pub fn move_item(
        &self,
        doc: &mut EstimateDocument,
        item_id: &str,
        target_group_id: &str,
        after_id: Option<&str>,
    ) -> CalculationResult<()> {
        let old_ancestors = doc
            .root
            .ancestors(item_id)
            .ok_or_else(|| DomainError::ItemNotFound(item_id.to_string()))?;
        doc.root.move_item(item_id, target_group_id, after_id)?;
        let new_ancestors = doc.root.ancestors(item_id).unwrap_or_default();

        self.refresh_ancestors(&mut doc.root, &old_ancestors);
        self.refresh_ancestors(&mut doc.root, &new_ancestors);
        self.store.save_tree(&doc.id, &doc.root)?;
        Ok(())
    }
}
