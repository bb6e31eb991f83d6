// ==========================================
// 八字排盘引擎 - 应用状态
// ==========================================
// 职责: 装配配置、规则库、缓存与编排器, 作为进程级共享状态
// ==========================================

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::config_manager::ConfigManager;
use crate::config::engine_config::EngineConfig;
use crate::config::engine_config_trait::EngineConfigReader;
use crate::db::open_sqlite_connection;
use crate::engine::RuleStore;
use crate::importer::{ImportResult, ImportSummary, LoadMode, RuleImporter};
use crate::orchestrator::{
    CacheStore, ComputationRequest, ComputationResponse, LocalModuleService, MemoryCacheStore,
    ModuleOrchestrator, OrchestratorResult, SqliteCacheStore,
};

/// 应用状态
///
/// 持有规则库与编排器; 规则库热更新后, 编排器下一次请求即读取新版本
pub struct AppState {
    /// 数据库路径（内存模式为 None）
    pub db_path: Option<String>,

    /// 生效的引擎参数
    pub config: EngineConfig,

    /// 配置管理器（内存模式为 None）
    pub config_manager: Option<Arc<ConfigManager>>,

    /// 规则库
    pub rule_store: Arc<RuleStore>,

    /// 结果缓存
    pub cache: Arc<dyn CacheStore>,

    /// 模块编排器
    pub orchestrator: Arc<ModuleOrchestrator>,
}

impl AppState {
    /// 基于 SQLite 数据库创建 AppState
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（config_kv 与 cache_kv 共用一个连接）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub async fn new(db_path: &str) -> Result<Self, String> {
        tracing::info!(db_path, "初始化AppState");

        let conn = open_sqlite_connection(db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = config_manager
            .load_engine_config()
            .await
            .map_err(|e| format!("无法读取引擎参数: {}", e))?;

        let cache: Arc<dyn CacheStore> = Arc::new(
            SqliteCacheStore::from_connection(conn)
                .map_err(|e| format!("无法创建SqliteCacheStore: {}", e))?,
        );

        let mut state = Self::assemble(config, cache);
        state.db_path = Some(db_path.to_string());
        state.config_manager = Some(config_manager);

        tracing::info!("AppState初始化完成");
        Ok(state)
    }

    /// 纯内存 AppState（固定参数 + 内存缓存）
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::assemble(config, Arc::new(MemoryCacheStore::new()))
    }

    fn assemble(config: EngineConfig, cache: Arc<dyn CacheStore>) -> Self {
        let rule_store = Arc::new(RuleStore::new());
        let service = Arc::new(LocalModuleService::new(&config, rule_store.clone()));
        let orchestrator = Arc::new(
            ModuleOrchestrator::new(&config, service).with_cache(cache.clone()),
        );

        Self {
            db_path: None,
            config,
            config_manager: None,
            rule_store,
            cache,
            orchestrator,
        }
    }

    /// 从规则文件装载规则库
    pub async fn load_rules<P: AsRef<Path> + Send + Sync>(
        &self,
        paths: Vec<P>,
        mode: LoadMode,
    ) -> ImportResult<ImportSummary> {
        RuleImporter::default()
            .load_into_store(&self.rule_store, paths, mode)
            .await
    }

    /// 执行计算请求
    pub async fn execute(&self, request: ComputationRequest) -> OrchestratorResult<ComputationResponse> {
        self.orchestrator.execute(request).await
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 BAZI_ENGINE_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("BAZI_ENGINE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./bazi_engine.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("bazi-engine");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("bazi_engine.db");
        }
    }

    path.to_string_lossy().to_string()
}
