// ==========================================
// 管件安装估价系统 - 计算设置
// ==========================================
// 职责: 货币与汇率、综合工时单价、制作/安装拆分计价参数
// 存储: config_kv（由 ConfigManager 逐键读写）
// ==========================================

use serde::{Deserialize, Serialize};

/// 制作/安装拆分计价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPricing {
    pub enabled: bool,
    /// 制作工时占比（0~1），安装占比 = 1 - 制作占比
    pub manufacturing_fraction: f64,
    pub manufacturing_rate: f64,
    pub assembly_rate: f64,
}

impl Default for SplitPricing {
    fn default() -> Self {
        Self {
            enabled: false,
            manufacturing_fraction: 0.4,
            manufacturing_rate: 65.0,
            assembly_rate: 75.0,
        }
    }
}

impl SplitPricing {
    pub fn assembly_fraction(&self) -> f64 {
        1.0 - self.manufacturing_fraction
    }
}

/// 计算设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationSettings {
    pub currency: String,
    /// 远程材料价的汇率乘数
    pub exchange_rate: f64,
    /// 综合工时单价
    pub hourly_rate: f64,
    #[serde(default)]
    pub split_pricing: SplitPricing,
}

impl Default for CalculationSettings {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            exchange_rate: 1.0,
            hourly_rate: 70.0,
            split_pricing: SplitPricing::default(),
        }
    }
}

impl CalculationSettings {
    /// 基本合法性检查，返回问题描述列表
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.currency.trim().is_empty() {
            problems.push("currency 不能为空".to_string());
        }
        if !(self.exchange_rate.is_finite() && self.exchange_rate > 0.0) {
            problems.push(format!("exchange_rate 必须为正数: {}", self.exchange_rate));
        }
        if !(self.hourly_rate.is_finite() && self.hourly_rate >= 0.0) {
            problems.push(format!("hourly_rate 不能为负: {}", self.hourly_rate));
        }
        let fraction = self.split_pricing.manufacturing_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            problems.push(format!("manufacturing_fraction 必须在 0~1 之间: {}", fraction));
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(CalculationSettings::default().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let settings = CalculationSettings {
            currency: " ".into(),
            exchange_rate: 0.0,
            hourly_rate: -1.0,
            split_pricing: SplitPricing {
                manufacturing_fraction: 1.5,
                ..SplitPricing::default()
            },
        };
        assert_eq!(settings.validate().len(), 4);
    }

    #[test]
    fn test_assembly_fraction_complements_manufacturing() {
        let split = SplitPricing {
            manufacturing_fraction: 0.25,
            ..SplitPricing::default()
        };
        assert_eq!(split.assembly_fraction(), 0.75);
    }
}
