// ==========================================
// 八字排盘引擎 - 模块结果缓存
// ==========================================
// 职责: get / set / 按前缀失效
// 说明: 缓存只是优化层, 任何缓存错误都不影响计算结果（由编排器转为警告）
// 实现: MemoryCacheStore（进程内）、SqliteCacheStore（cache_kv 表）
// ==========================================

use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// 缓存错误
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("缓存后端错误: {0}")]
    Backend(String),

    #[error("缓存数据库错误: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("缓存值序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("锁获取失败: {0}")]
    LockError(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

// ==========================================
// CacheStore Trait
// ==========================================
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    async fn set(&self, key: &str, value: &Value) -> CacheResult<()>;

    /// 删除所有以 prefix 开头的条目, 返回删除数
    async fn invalidate_prefix(&self, prefix: &str) -> CacheResult<usize>;
}

// ==========================================
// MemoryCacheStore - 进程内缓存
// ==========================================
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> CacheResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
}

// ==========================================
// SqliteCacheStore - SQLite 持久缓存
// ==========================================
const CREATE_CACHE_KV_SQL: &str = "CREATE TABLE IF NOT EXISTS cache_kv (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// 打开（必要时创建）缓存库
    pub fn new(db_path: &str) -> CacheResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 与配置表共用连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> CacheResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| CacheError::LockError(e.to_string()))?;
            guard.execute_batch(CREATE_CACHE_KV_SQL)?;
        }
        Ok(Self { conn })
    }

    fn lock(&self) -> CacheResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CacheError::LockError(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let raw: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT value FROM cache_kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?
        };

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> CacheResult<()> {
        let text = serde_json::to_string(value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cache_kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2, created_at = datetime('now')",
            params![key, text],
        )?;
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let conn = self.lock()?;
        // substr 比较避免 LIKE 通配符转义
        let removed = conn.execute(
            "DELETE FROM cache_kv WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        )?;
        debug!(prefix, removed, "缓存按前缀失效");
        Ok(removed)
    }
}
