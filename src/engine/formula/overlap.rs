// ==========================================
// 条件区间重叠检测（编辑期不变量）
// ==========================================
// 同一取值项上的两个条件不得同时可满足:
// - 运算相同 -> 重叠
// - 任一为 eq/neq -> 重叠
// - 同方向区间 (gt/gte 与 gt/gte, lt/lte 与 lt/lte) -> 重叠
// - 下界 X 与上界 Y: X <= Y（含容差内相等，边界相接也算）-> 重叠
// 复杂度: O(n²) 两两扫描
// ==========================================

use crate::domain::formula::{Condition, ConditionOption};
use crate::domain::types::FieldValue;
use std::fmt;

/// 一对重叠条件（下标为规则条件列表中的位置）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionOverlap {
    pub first: usize,
    pub second: usize,
    pub option: ConditionOption,
}

impl fmt::Display for ConditionOverlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conditions[{}] 与 conditions[{}] ({:?})",
            self.first, self.second, self.option
        )
    }
}

/// 容差相等（相对容差，量级小于 1 时按绝对容差）
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= tolerance * scale
}

/// 下界值是否不大于上界值
fn lower_not_above_upper(lower: &FieldValue, upper: &FieldValue, tolerance: f64) -> bool {
    match (lower.as_number(), upper.as_number()) {
        (Some(lo), Some(hi)) => lo < hi || approx_eq(lo, hi, tolerance),
        _ => lower.as_text() <= upper.as_text(),
    }
}

/// 两个条件是否重叠
pub fn conditions_overlap(a: &Condition, b: &Condition, tolerance: f64) -> bool {
    if a.option != b.option {
        return false;
    }
    // 值为空的条件尚在编辑中，不参与校验
    let (a_value, b_value) = match (&a.value, &b.value) {
        (Some(x), Some(y)) => (x, y),
        _ => return false,
    };

    if a.operation == b.operation {
        return true;
    }
    let is_point = |c: &Condition| !c.operation.is_lower_bound() && !c.operation.is_upper_bound();
    if is_point(a) || is_point(b) {
        return true;
    }
    if a.operation.is_lower_bound() == b.operation.is_lower_bound() {
        return true;
    }

    let (lower, upper) = if a.operation.is_lower_bound() {
        (a_value, b_value)
    } else {
        (b_value, a_value)
    };
    lower_not_above_upper(lower, upper, tolerance)
}

/// 扫描条件列表，返回全部重叠对
pub fn find_overlaps(conditions: &[Condition], tolerance: f64) -> Vec<ConditionOverlap> {
    let mut overlaps = Vec::new();
    for i in 0..conditions.len() {
        for j in (i + 1)..conditions.len() {
            if conditions_overlap(&conditions[i], &conditions[j], tolerance) {
                overlaps.push(ConditionOverlap {
                    first: i,
                    second: j,
                    option: conditions[i].option,
                });
            }
        }
    }
    overlaps
}
