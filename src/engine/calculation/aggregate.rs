// ==========================================
// 分组汇总
// ==========================================
// 规则:
// - 只汇总直接子条目的当前数值属性（任一子条目有该属性时才写入）
// - 全部子条目已计算时分组才标记为已计算（空分组视为已计算）
// - 规则增量按规则ID合并：首次出现复制，之后累加
// - 幂等：无变更时重复汇总结果一致
// ==========================================

use crate::domain::attribute::AttributeName;
use crate::domain::formula::merge_deltas;
use crate::domain::item::Item;
use crate::domain::types::CalcState;

/// 汇总单个分组（叶子原样返回），返回汇总前的状态
pub fn aggregate_group(group: &mut Item) -> CalcState {
    let previous = group.calc_state();
    if !group.is_group() {
        return previous;
    }

    let children = group.children();
    let sums: Vec<(AttributeName, f64)> = AttributeName::SUMMED
        .iter()
        .filter_map(|&name| {
            let values: Vec<f64> = children
                .iter()
                .filter_map(|c| c.attributes().number(name))
                .collect();
            if values.is_empty() {
                None
            } else {
                Some((name, values.iter().sum()))
            }
        })
        .collect();
    let all_calculated = children
        .iter()
        .all(|c| c.calc_state() == CalcState::Calculated);
    let deltas = merge_deltas(children.iter().flat_map(|c| c.attributes().formulas()));

    let attrs = group.attributes_mut();
    attrs.remove_all(&AttributeName::DERIVED);
    attrs.remove(AttributeName::Calculating);
    for (name, value) in sums {
        attrs.set_number(name, value);
    }
    if !deltas.is_empty() {
        attrs.set_formulas(deltas);
    }
    if all_calculated {
        attrs.set_flag(AttributeName::Calculated, true);
    }
    previous
}

/// 自底向上汇总整棵子树，每个分组汇总后回调（参数为汇总前状态）
pub fn aggregate_subtree(item: &mut Item, on_group: &mut dyn FnMut(&Item, CalcState)) {
    if let Some(group) = item.as_group_mut() {
        for child in group.items.iter_mut() {
            aggregate_subtree(child, on_group);
        }
    } else {
        return;
    }
    let previous = aggregate_group(item);
    on_group(item, previous);
}
