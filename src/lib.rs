// ==========================================
// 八字排盘引擎 - 核心库
// ==========================================
// 能力: 四柱排盘、大运流年、旺衰评分、干支关系、规则匹配
// 编排: 按依赖分层并发调度模块, 部分失败不拖垮整个请求
// 技术栈: Rust + Tokio + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 干支、命盘、规则等实体
pub mod domain;

// 引擎层 - 排盘与评分算法、规则库
pub mod engine;

// 配置层 - 引擎参数
pub mod config;

// 编排层 - 模块调度与缓存
pub mod orchestrator;

// 导入层 - 规则表格
pub mod importer;

// 应用层 - 进程级装配
pub mod app;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能埋点
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    Branch, Element, Gender, LuckDirection, PillarPosition, Stem, StrengthClass, TenGod,
};

// 领域实体
pub use domain::{BirthInput, Chart, Condition, CorpusStamp, MatchResult, Pillar, Rule};

// 引擎
pub use engine::{
    CalendarEngine, EngineError, EngineResult, LuckPeriodEngine, RelationAnalyzer, RuleMatcher,
    RuleStore, StrengthReport, StrengthScorer,
};

// 编排
pub use orchestrator::{
    ComputationRequest, ComputationResponse, ModuleKind, ModuleOrchestrator, ModuleOutcome,
    ModuleRequest, OrchestratorError,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "八字排盘引擎";
