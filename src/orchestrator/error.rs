// ==========================================
// 八字排盘引擎 - 编排层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层:
// - ServiceError: 单个模块服务调用失败（含在本模块内）
// - ModuleFailure: 响应中的模块级错误标注
// - OrchestratorError: 整个请求失败（输入非法、命盘不可得、超时、部分失败转完整结果）
// ==========================================

use crate::engine::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ==========================================
// ServiceError - 模块服务错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("规则库尚未装载")]
    CorpusUnavailable,

    #[error("规则库版本过旧: required>={required}, current={current}")]
    StaleCorpus { required: u64, current: u64 },

    #[error("缺少依赖模块结果: {0}")]
    MissingDependency(String),

    #[error("模块计算失败: {0}")]
    ComputationFailed(String),
}

impl From<EngineError> for ServiceError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            EngineError::CorpusUnavailable => ServiceError::CorpusUnavailable,
            EngineError::StaleCorpus { required, current } => {
                ServiceError::StaleCorpus { required, current }
            }
            other => ServiceError::ComputationFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::ComputationFailed(format!("结果序列化失败: {}", e))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ==========================================
// ModuleFailure - 模块级错误标注
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleFailureKind {
    /// 模块服务调用失败
    ComputationFailed,
    /// 规则库尚未装载（仅影响规则匹配模块）
    CorpusUnavailable,
    /// 规则库版本低于请求要求
    StaleCorpus,
    /// 依赖的模块失败
    DependencyFailed,
    /// 超过单模块时限
    Timeout,
}

impl fmt::Display for ModuleFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleFailureKind::ComputationFailed => "computation_failed",
            ModuleFailureKind::CorpusUnavailable => "corpus_unavailable",
            ModuleFailureKind::StaleCorpus => "stale_corpus",
            ModuleFailureKind::DependencyFailed => "dependency_failed",
            ModuleFailureKind::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFailure {
    pub kind: ModuleFailureKind,
    pub message: String,
}

impl ModuleFailure {
    pub fn new(kind: ModuleFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ModuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<ServiceError> for ModuleFailure {
    fn from(e: ServiceError) -> Self {
        let kind = match &e {
            ServiceError::CorpusUnavailable => ModuleFailureKind::CorpusUnavailable,
            ServiceError::StaleCorpus { .. } => ModuleFailureKind::StaleCorpus,
            ServiceError::MissingDependency(_) => ModuleFailureKind::DependencyFailed,
            ServiceError::InvalidInput(_) | ServiceError::ComputationFailed(_) => {
                ModuleFailureKind::ComputationFailed
            }
        };
        ModuleFailure::new(kind, e.to_string())
    }
}

// ==========================================
// OrchestratorError - 请求级错误
// ==========================================
#[derive(Error, Debug)]
pub enum OrchestratorError {
    // ===== 输入错误（致命） =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("未知模块: {0}")]
    UnknownModule(String),

    #[error("模块参数非法 (module={module}): {message}")]
    InvalidParams { module: String, message: String },

    // ===== 执行错误 =====
    #[error("命盘计算失败, 请求终止: {0}")]
    ChartUnavailable(ModuleFailure),

    #[error("请求超时: {timeout_ms}ms")]
    RequestTimedOut { timeout_ms: u64 },

    #[error("部分模块失败: {}", failed.join(", "))]
    PartialResult { failed: Vec<String> },

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
