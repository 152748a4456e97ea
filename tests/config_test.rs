// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 计算设置、计价规则、自定义条目、收集器参数的读写
// ==========================================

mod helpers;

use helpers::test_data_builder::bracket_definition;
use helpers::test_db::create_test_db;
use pipe_estimate::config::{config_keys, SplitPricing};
use pipe_estimate::domain::{Condition, ConditionOperation, ConditionOption};
use pipe_estimate::engine::{FormulaError, PricingCollector};
use pipe_estimate::{CalculationSettings, ConfigManager, CustomItemCatalog, FieldValue, Formula};
use std::time::Duration;

fn quantity_condition(operation: ConditionOperation, value: f64) -> Condition {
    Condition::new(ConditionOption::Quantity, operation, FieldValue::from(value))
}

#[test]
fn test_defaults_when_nothing_stored() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let settings = config_manager.load_calculation_settings().unwrap();
    assert_eq!(settings, CalculationSettings::default());
    assert!(config_manager.load_formulas().unwrap().is_empty());
    assert_eq!(
        config_manager.load_custom_items().unwrap(),
        CustomItemCatalog::default()
    );
}

#[test]
fn test_settings_round_trip() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let settings = CalculationSettings {
        currency: "CHF".into(),
        exchange_rate: 0.95,
        hourly_rate: 88.5,
        split_pricing: SplitPricing {
            enabled: true,
            manufacturing_fraction: 0.3,
            manufacturing_rate: 60.0,
            assembly_rate: 90.0,
        },
    };
    config_manager.save_calculation_settings(&settings).unwrap();

    // 重新打开同一数据库
    let reopened = ConfigManager::new(&db_path).expect("Failed to reopen ConfigManager");
    assert_eq!(reopened.load_calculation_settings().unwrap(), settings);
}

#[test]
fn test_invalid_settings_are_not_saved() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let settings = CalculationSettings {
        exchange_rate: -1.0,
        ..CalculationSettings::default()
    };
    assert!(config_manager.save_calculation_settings(&settings).is_err());
    assert_eq!(
        config_manager
            .get_global_config_value(config_keys::EXCHANGE_RATE)
            .unwrap(),
        None
    );
}

#[test]
fn test_malformed_value_falls_back_to_default() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    config_manager
        .set_global_config_value(config_keys::HOURLY_RATE, "seventy")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::EXCHANGE_RATE, "1.1")
        .unwrap();

    let settings = config_manager.load_calculation_settings().unwrap();
    assert_eq!(settings.hourly_rate, CalculationSettings::default().hourly_rate);
    assert_eq!(settings.exchange_rate, 1.1);
}

// ==========================================
// 计价规则
// ==========================================

#[test]
fn test_formulas_round_trip() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let formulas = vec![
        Formula::new("small", "Small lots")
            .with_condition(quantity_condition(ConditionOperation::Lt, 50.0))
            .with_effort_hours("effortHours * 1.2"),
        Formula::new("bulk", "Bulk")
            .with_condition(quantity_condition(ConditionOperation::Gte, 100.0))
            .with_condition(Condition::new(
                ConditionOption::Dn1,
                ConditionOperation::Lt,
                FieldValue::from(500.0),
            ))
            .with_material_price("materialPrice * 0.9"),
    ];
    config_manager.save_formulas(&formulas).unwrap();
    assert_eq!(config_manager.load_formulas().unwrap(), formulas);
}

#[test]
fn test_one_lower_bound_per_option_is_accepted() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    // 各选项各一个下界，互不冲突
    let heavy = Formula::new("heavy", "Heavy large pipes")
        .with_condition(quantity_condition(ConditionOperation::Gte, 10.0))
        .with_condition(Condition::new(
            ConditionOption::Dn1,
            ConditionOperation::Gt,
            FieldValue::from(200.0),
        ))
        .with_condition(Condition::new(
            ConditionOption::Weight,
            ConditionOperation::Gte,
            FieldValue::from(50.0),
        ))
        .with_effort_hours("effortHours * 1.5");
    config_manager.save_formulas(&[heavy.clone()]).unwrap();
    assert_eq!(config_manager.load_formulas().unwrap(), vec![heavy]);
}

#[test]
fn test_overlapping_conditions_are_rejected() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    // gte 100 与 lt 100 边界相接即视为重叠
    let touching = Formula::new("touching", "Touching bounds")
        .with_condition(quantity_condition(ConditionOperation::Gte, 100.0))
        .with_condition(quantity_condition(ConditionOperation::Lt, 100.0));
    let err = config_manager.save_formulas(&[touching]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormulaError>(),
        Some(FormulaError::OverlappingConditions { .. })
    ));
    assert_eq!(
        config_manager
            .get_global_config_value(config_keys::FORMULAS)
            .unwrap(),
        None
    );

    // gte 100 与 lt 50 不相交，可以保存
    let disjoint = Formula::new("disjoint", "Disjoint bounds")
        .with_condition(quantity_condition(ConditionOperation::Gte, 100.0))
        .with_condition(quantity_condition(ConditionOperation::Lt, 50.0));
    config_manager.save_formulas(&[disjoint]).unwrap();
    assert_eq!(config_manager.load_formulas().unwrap().len(), 1);
}

#[test]
fn test_formula_with_bad_expression_is_rejected() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let broken = Formula::new("broken", "Broken").with_material_price("materialPrice * (2");
    let err = config_manager.save_formulas(&[broken]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormulaError>(),
        Some(FormulaError::InvalidExpression { .. })
    ));

    // 嵌套过深同样按语法错误拒绝
    let nested = format!("{}materialPrice{}", "(".repeat(5_000), ")".repeat(5_000));
    let deep = Formula::new("deep", "Deep").with_material_price(&nested);
    let err = config_manager.save_formulas(&[deep]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormulaError>(),
        Some(FormulaError::InvalidExpression { .. })
    ));
}

// ==========================================
// 自定义条目 / 收集器参数
// ==========================================

#[test]
fn test_custom_items_round_trip() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let catalog = CustomItemCatalog::new(vec![bracket_definition()]);
    config_manager.save_custom_items(&catalog).unwrap();

    let loaded = config_manager.load_custom_items().unwrap();
    assert_eq!(loaded, catalog);
    assert!(loaded.find("custom:bracket").is_some());
}

#[tokio::test]
async fn test_collector_config_overrides() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    config_manager
        .set_global_config_value(config_keys::COLLECTOR_DEBOUNCE_MS, "50")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::COLLECTOR_BATCH_SIZE, "5")
        .unwrap();

    let config = config_manager.load_collector_config().unwrap();
    assert_eq!(config.debounce, Duration::from_millis(50));
    assert_eq!(config.max_wait, Duration::from_millis(1000));
    assert_eq!(config.batch_size, 5);
    assert_eq!(config.cache_capacity, 100);

    // 配置可直接用于构建收集器
    let transport = std::sync::Arc::new(helpers::mock_transport::MockPricingTransport::new());
    let collector = PricingCollector::new(transport, config);
    assert_eq!(collector.cache_len(), 0);
}
