// ==========================================
// 八字排盘引擎 - 配置管理器
// ==========================================
// 职责: 引擎参数的加载、查询、覆写
// 存储: config_kv 表 (scope_id + key → value), 当前只使用 global scope
// 说明: 缺失或无法解析的配置项回落到 EngineConfig 默认值
// ==========================================

use crate::config::engine_config::{EngineConfig, MAX_MAJOR_PERIOD_COUNT};
use crate::config::engine_config_trait::{ConfigResult, EngineConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

const CREATE_CONFIG_KV_SQL: &str = "CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key      TEXT NOT NULL,
    value    TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
)";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    defaults: EngineConfig,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（表不存在时自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&guard)?;
            guard.execute_batch(CREATE_CONFIG_KV_SQL)?;
        }

        Ok(Self {
            conn,
            defaults: EngineConfig::default(),
        })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
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

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析, 缺失或解析失败时返回默认值
    fn get_parsed_or<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(config_key = key, value = %raw, "配置值无法解析, 使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 读取权重数组（JSON: [1.0, 1.2, 0, 1.0]）
    fn get_weights_or(&self, key: &str, default: [f64; 4]) -> ConfigResult<[f64; 4]> {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match serde_json::from_str::<[f64; 4]>(&raw) {
                Ok(v) => Ok(v),
                Err(e) => {
                    warn!(config_key = key, error = %e, "权重配置格式错误, 使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 获取所有 global 配置的快照（JSON 格式, 键有序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置（覆盖现有 global 配置）
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in &config_map {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
        }
        tx.commit()?;

        Ok(count)
    }
}

#[async_trait]
impl EngineConfigReader for ConfigManager {
    // ===== 历法 =====

    async fn get_utc_offset_minutes(&self) -> ConfigResult<i32> {
        self.get_parsed_or(
            config_keys::UTC_OFFSET_MINUTES,
            self.defaults.calendar.utc_offset_minutes,
        )
    }

    async fn get_late_zi_rolls_day(&self) -> ConfigResult<bool> {
        self.get_parsed_or(
            config_keys::LATE_ZI_ROLLS_DAY,
            self.defaults.calendar.late_zi_rolls_day,
        )
    }

    // ===== 大运 =====

    async fn get_luck_span_years(&self) -> ConfigResult<u32> {
        let v = self.get_parsed_or(config_keys::LUCK_SPAN_YEARS, self.defaults.luck.span_years)?;
        Ok(v.max(1))
    }

    async fn get_major_period_count(&self) -> ConfigResult<u32> {
        let v = self.get_parsed_or(
            config_keys::MAJOR_PERIOD_COUNT,
            self.defaults.luck.major_period_count,
        )?;
        if !(1..=MAX_MAJOR_PERIOD_COUNT).contains(&v) {
            warn!(count = v, max = MAX_MAJOR_PERIOD_COUNT, "大运步数超出范围, 使用默认值");
            return Ok(self.defaults.luck.major_period_count);
        }
        Ok(v)
    }

    // ===== 旺衰 =====

    async fn get_strength_threshold(&self) -> ConfigResult<f64> {
        let v = self.get_parsed_or(
            config_keys::STRENGTH_THRESHOLD,
            self.defaults.strength.threshold,
        )?;
        if !(0.0..=1.0).contains(&v) {
            warn!(threshold = v, "身强阈值超出 [0, 1], 使用默认值");
            return Ok(self.defaults.strength.threshold);
        }
        Ok(v)
    }

    async fn get_strength_weights(&self) -> ConfigResult<([f64; 4], [f64; 4])> {
        Ok((
            self.get_weights_or(
                config_keys::STRENGTH_STEM_WEIGHTS,
                self.defaults.strength.stem_weights,
            )?,
            self.get_weights_or(
                config_keys::STRENGTH_BRANCH_WEIGHTS,
                self.defaults.strength.branch_weights,
            )?,
        ))
    }

    // ===== 编排 =====

    async fn get_module_timeout_ms(&self) -> ConfigResult<u64> {
        self.get_parsed_or(
            config_keys::MODULE_TIMEOUT_MS,
            self.defaults.orchestrator.module_timeout_ms,
        )
    }

    async fn get_cache_enabled(&self) -> ConfigResult<bool> {
        self.get_parsed_or(
            config_keys::CACHE_ENABLED,
            self.defaults.orchestrator.cache_enabled,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 历法
    pub const UTC_OFFSET_MINUTES: &str = "calendar.utc_offset_minutes";
    pub const LATE_ZI_ROLLS_DAY: &str = "calendar.late_zi_rolls_day";

    // 大运
    pub const LUCK_SPAN_YEARS: &str = "luck.span_years";
    pub const MAJOR_PERIOD_COUNT: &str = "luck.major_period_count";

    // 旺衰
    pub const STRENGTH_THRESHOLD: &str = "strength.threshold";
    pub const STRENGTH_STEM_WEIGHTS: &str = "strength.stem_weights"; // JSON 数组
    pub const STRENGTH_BRANCH_WEIGHTS: &str = "strength.branch_weights"; // JSON 数组

    // 编排
    pub const MODULE_TIMEOUT_MS: &str = "orchestrator.module_timeout_ms";
    pub const CACHE_ENABLED: &str = "orchestrator.cache_enabled";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_manager() -> (NamedTempFile, ConfigManager) {
        let file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(file.path().to_str().unwrap()).unwrap();
        (file, manager)
    }

    #[tokio::test]
    async fn test_defaults_when_table_empty() {
        let (_file, manager) = open_manager();
        let config = manager.load_engine_config().await.unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn test_overrides_and_bad_values() {
        let (_file, manager) = open_manager();
        manager
            .set_global_config_value(config_keys::UTC_OFFSET_MINUTES, "540")
            .unwrap();
        manager
            .set_global_config_value(config_keys::STRENGTH_STEM_WEIGHTS, "[1, 1, 0, 1]")
            .unwrap();
        manager
            .set_global_config_value(config_keys::MODULE_TIMEOUT_MS, "not-a-number")
            .unwrap();
        manager
            .set_global_config_value(config_keys::STRENGTH_THRESHOLD, "1.5")
            .unwrap();
        manager
            .set_global_config_value(config_keys::MAJOR_PERIOD_COUNT, "4294967295")
            .unwrap();

        let config = manager.load_engine_config().await.unwrap();
        assert_eq!(config.calendar.utc_offset_minutes, 540);
        assert_eq!(config.strength.stem_weights, [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(config.orchestrator.module_timeout_ms, 3_000);
        assert_eq!(config.strength.threshold, 0.5);
        assert_eq!(config.luck.major_period_count, 8);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (_file, manager) = open_manager();
        manager
            .set_global_config_value(config_keys::LUCK_SPAN_YEARS, "10")
            .unwrap();
        manager
            .set_global_config_value(config_keys::CACHE_ENABLED, "false")
            .unwrap();

        let snapshot = manager.get_config_snapshot().unwrap();
        let (_other_file, other) = open_manager();
        assert_eq!(other.restore_config_from_snapshot(&snapshot).unwrap(), 2);
        assert_eq!(
            other
                .get_global_config_value(config_keys::CACHE_ENABLED)
                .unwrap()
                .as_deref(),
            Some("false")
        );
    }
}
