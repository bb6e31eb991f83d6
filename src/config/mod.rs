// ==========================================
// 八字排盘引擎 - 配置层
// ==========================================
// 职责: 引擎参数默认值与覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config;
pub mod engine_config_trait;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use engine_config::{
    CalendarConfig, EngineConfig, LuckConfig, OrchestratorConfig, StrengthConfig,
};
pub use engine_config_trait::{ConfigResult, EngineConfigReader, StaticConfigReader};
