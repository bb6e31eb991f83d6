// ==========================================
// 八字排盘引擎 - 编排层
// ==========================================
// 职责: 按依赖分层并发调度模块计算, 合并结果, 缓存
// ==========================================

pub mod cache;
pub mod error;
pub mod module;
#[allow(clippy::module_inception)]
pub mod orchestrator;
pub mod service;

pub use cache::{CacheError, CacheResult, CacheStore, MemoryCacheStore, SqliteCacheStore};
pub use error::{
    ModuleFailure, ModuleFailureKind, OrchestratorError, OrchestratorResult, ServiceError,
    ServiceResult,
};
pub use module::{
    AnnualPeriodsParams, ComputationKey, MajorPeriodsParams, ModuleKind, ModuleParams,
    ModuleRequest, RuleMatchParams,
};
pub use orchestrator::{ComputationRequest, ComputationResponse, ModuleOrchestrator, ModuleOutcome};
pub use service::{LocalModuleService, ModuleContext, ModuleService};
