// ==========================================
// 管件安装估价系统 - 配置管理器
// ==========================================
// 职责: 计算设置、计价规则、自定义条目、收集器参数的加载与保存
// 存储: config_kv 表 (key-value + scope)
// 红线: 规则保存前必须通过重叠/语法校验
// ==========================================

use crate::config::settings::{CalculationSettings, SplitPricing};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::custom_item::CustomItemCatalog;
use crate::domain::formula::Formula;
use crate::engine::collector::CollectorConfig;
use crate::engine::formula::FormulaEngine;
use rusqlite::{params, Connection};
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA 并建表（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            ensure_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 批量写入（单事务）
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), Box<dyn Error>> {
        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 读取并解析配置值，不存在或格式错误时使用默认值
    fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>> {
        let value = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match value.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %value, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    // ===== 计算设置 =====

    /// 读取计算设置（缺失键使用默认值）
    pub fn load_calculation_settings(&self) -> Result<CalculationSettings, Box<dyn Error>> {
        let defaults = CalculationSettings::default();
        let split_defaults = SplitPricing::default();

        Ok(CalculationSettings {
            currency: self
                .get_config_value(config_keys::CURRENCY)?
                .unwrap_or(defaults.currency),
            exchange_rate: self.get_parsed_or(config_keys::EXCHANGE_RATE, defaults.exchange_rate)?,
            hourly_rate: self.get_parsed_or(config_keys::HOURLY_RATE, defaults.hourly_rate)?,
            split_pricing: SplitPricing {
                enabled: self.get_parsed_or(config_keys::SPLIT_PRICING_ENABLED, split_defaults.enabled)?,
                manufacturing_fraction: self.get_parsed_or(
                    config_keys::MANUFACTURING_FRACTION,
                    split_defaults.manufacturing_fraction,
                )?,
                manufacturing_rate: self
                    .get_parsed_or(config_keys::MANUFACTURING_RATE, split_defaults.manufacturing_rate)?,
                assembly_rate: self
                    .get_parsed_or(config_keys::ASSEMBLY_RATE, split_defaults.assembly_rate)?,
            },
        })
    }

    /// 保存计算设置（先校验）
    pub fn save_calculation_settings(&self, settings: &CalculationSettings) -> Result<(), Box<dyn Error>> {
        let problems = settings.validate();
        if !problems.is_empty() {
            return Err(format!("计算设置无效: {}", problems.join("; ")).into());
        }

        let split = &settings.split_pricing;
        self.set_many(&[
            (config_keys::CURRENCY, settings.currency.clone()),
            (config_keys::EXCHANGE_RATE, settings.exchange_rate.to_string()),
            (config_keys::HOURLY_RATE, settings.hourly_rate.to_string()),
            (config_keys::SPLIT_PRICING_ENABLED, split.enabled.to_string()),
            (config_keys::MANUFACTURING_FRACTION, split.manufacturing_fraction.to_string()),
            (config_keys::MANUFACTURING_RATE, split.manufacturing_rate.to_string()),
            (config_keys::ASSEMBLY_RATE, split.assembly_rate.to_string()),
        ])?;
        tracing::info!(currency = %settings.currency, "计算设置已保存");
        Ok(())
    }

    // ===== 计价规则 =====

    pub fn load_formulas(&self) -> Result<Vec<Formula>, Box<dyn Error>> {
        match self.get_config_value(config_keys::FORMULAS)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// 保存计价规则（任一规则校验失败则整体拒绝）
    pub fn save_formulas(&self, formulas: &[Formula]) -> Result<(), Box<dyn Error>> {
        let engine = FormulaEngine::default();
        for formula in formulas {
            engine.validate(formula)?;
        }
        self.set_global_config_value(config_keys::FORMULAS, &serde_json::to_string(formulas)?)?;
        tracing::info!(count = formulas.len(), "计价规则已保存");
        Ok(())
    }

    // ===== 自定义条目 =====

    pub fn load_custom_items(&self) -> Result<CustomItemCatalog, Box<dyn Error>> {
        match self.get_config_value(config_keys::CUSTOM_ITEMS)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(CustomItemCatalog::default()),
        }
    }

    pub fn save_custom_items(&self, catalog: &CustomItemCatalog) -> Result<(), Box<dyn Error>> {
        self.set_global_config_value(config_keys::CUSTOM_ITEMS, &serde_json::to_string(catalog)?)
    }

    // ===== 收集器参数 =====

    pub fn load_collector_config(&self) -> Result<CollectorConfig, Box<dyn Error>> {
        let defaults = CollectorConfig::default();
        Ok(CollectorConfig {
            debounce: Duration::from_millis(self.get_parsed_or(
                config_keys::COLLECTOR_DEBOUNCE_MS,
                defaults.debounce.as_millis() as u64,
            )?),
            max_wait: Duration::from_millis(self.get_parsed_or(
                config_keys::COLLECTOR_MAX_WAIT_MS,
                defaults.max_wait.as_millis() as u64,
            )?),
            batch_size: self.get_parsed_or(config_keys::COLLECTOR_BATCH_SIZE, defaults.batch_size)?,
            cache_capacity: self
                .get_parsed_or(config_keys::COLLECTOR_CACHE_CAPACITY, defaults.cache_capacity)?,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 计算设置
    pub const CURRENCY: &str = "currency";
    pub const EXCHANGE_RATE: &str = "exchange_rate";
    pub const HOURLY_RATE: &str = "hourly_rate";

    // 拆分计价
    pub const SPLIT_PRICING_ENABLED: &str = "split_pricing_enabled";
    pub const MANUFACTURING_FRACTION: &str = "manufacturing_fraction";
    pub const MANUFACTURING_RATE: &str = "manufacturing_rate";
    pub const ASSEMBLY_RATE: &str = "assembly_rate";

    // 规则与自定义条目 (JSON)
    pub const FORMULAS: &str = "formulas";
    pub const CUSTOM_ITEMS: &str = "custom_items";

    // 收集器
    pub const COLLECTOR_DEBOUNCE_MS: &str = "collector_debounce_ms";
    pub const COLLECTOR_MAX_WAIT_MS: &str = "collector_max_wait_ms";
    pub const COLLECTOR_BATCH_SIZE: &str = "collector_batch_size";
    pub const COLLECTOR_CACHE_CAPACITY: &str = "collector_cache_capacity";
}
