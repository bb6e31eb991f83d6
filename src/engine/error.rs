// ==========================================
// 八字排盘引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // ===== 输入错误 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ===== 规则库错误 =====
    #[error("规则库尚未装载")]
    CorpusUnavailable,

    #[error("规则库版本过旧: required>={required}, current={current}")]
    StaleCorpus { required: u64, current: u64 },

    #[error("规则编码重复: {0}")]
    DuplicateRuleCode(String),

    #[error("规则条件非法 (code={code}): {message}")]
    InvalidCondition { code: String, message: String },

    #[error("规则库装载锁获取失败: {0}")]
    LockError(String),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
