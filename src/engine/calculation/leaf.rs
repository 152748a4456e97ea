// ==========================================
// 叶子条目计算流水线
// ==========================================
// 1. 清空上次的派生属性
// 2. 命中自定义规格: 固定属性 × 数量（无网络）
// 3. 否则不完整: 保持未计算
// 4. 否则远程定价，材料价乘汇率
// 5. 应用计价规则
// 6. 展开工时费用（拆分 / 综合），合计 = 材料 + 人工
// 7. 标记已计算
// ==========================================

use super::{CalculationContext, CalculationEngine};
use crate::config::CalculationSettings;
use crate::domain::attribute::{AttributeName, AttributeSet, ItemError, ItemErrorKind};
use crate::domain::item::Item;

/// 从远程响应中采纳的基础属性
const PRICED_ATTRIBUTES: [AttributeName; 3] = [
    AttributeName::Weight,
    AttributeName::EffortHours,
    AttributeName::MaterialPrice,
];

impl CalculationEngine {
    /// 计算单个叶子（输入为快照，返回计算后的快照）
    pub(super) async fn calculate_leaf(&self, mut item: Item, context: &CalculationContext) -> Item {
        item.delete_attributes(&AttributeName::DERIVED);
        item.delete_attribute(AttributeName::Calculating);

        let quantity = item.quantity().unwrap_or(1.0);

        if let Some((definition, spec)) = context.custom_items.find_match(&item) {
            tracing::debug!(
                "自定义规格命中: item_id={}, type_id={}",
                item.id(),
                definition.type_id
            );
            let attrs = item.attributes_mut();
            attrs.set_number(AttributeName::Weight, spec.weight * quantity);
            attrs.set_number(AttributeName::EffortHours, spec.effort_hours * quantity);
            attrs.set_number(AttributeName::MaterialPrice, spec.material_price * quantity);
        } else if !item.is_complete() {
            tracing::debug!("条目数据不完整，保持未计算: item_id={}", item.id());
            return item;
        } else {
            match self.pricing.price(&item).await {
                Ok(response) if response.is_calculated() => {
                    apply_remote_price(item.attributes_mut(), &response.attributes, &context.settings);
                }
                Ok(_) => {
                    tracing::debug!("远程无定价数据，保持未计算: item_id={}", item.id());
                    return item;
                }
                Err(e) => {
                    tracing::warn!("远程定价失败: item_id={}, error={}", item.id(), e);
                    item.attributes_mut().push_error(ItemError {
                        kind: ItemErrorKind::Pricing,
                        source_id: None,
                        message: e.to_string(),
                    });
                    return item;
                }
            }
        }

        self.formula_engine.apply(&mut item, &context.formulas);
        expand_labour_pricing(item.attributes_mut(), &context.settings);
        item.attributes_mut().set_flag(AttributeName::Calculated, true);
        item
    }
}

/// 采纳远程基础属性，材料价乘汇率
fn apply_remote_price(target: &mut AttributeSet, remote: &AttributeSet, settings: &CalculationSettings) {
    for name in PRICED_ATTRIBUTES {
        if let Some(value) = remote.number(name) {
            let value = if name == AttributeName::MaterialPrice {
                value * settings.exchange_rate
            } else {
                value
            };
            target.set_number(name, value);
        }
    }
}

/// 工时费用展开：拆分时写制作/安装费，否则写综合工时费；合计 = 材料 + 人工
pub(crate) fn expand_labour_pricing(attrs: &mut AttributeSet, settings: &CalculationSettings) {
    let effort = attrs.number(AttributeName::EffortHours).unwrap_or(0.0);
    let material = attrs.number(AttributeName::MaterialPrice).unwrap_or(0.0);
    let split = &settings.split_pricing;

    let labour = if split.enabled {
        let manufacturing = effort * split.manufacturing_fraction * split.manufacturing_rate;
        let assembly = effort * split.assembly_fraction() * split.assembly_rate;
        attrs.set_number(AttributeName::ManufacturingPrice, manufacturing);
        attrs.set_number(AttributeName::AssemblyPrice, assembly);
        manufacturing + assembly
    } else {
        let effort_price = effort * settings.hourly_rate;
        attrs.set_number(AttributeName::EffortPrice, effort_price);
        effort_price
    };

    attrs.set_number(AttributeName::TotalPrice, material + labour);
}
