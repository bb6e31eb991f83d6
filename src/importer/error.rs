// ==========================================
// 八字排盘引擎 - 规则导入错误类型
// ==========================================
// 工具: thiserror 派生宏
// 行号: 与表格一致, 表头为第 1 行, 数据自第 2 行起
// ==========================================

use crate::engine::error::EngineError;
use thiserror::Error;

/// 规则导入错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("缺少必需列: {0}")]
    MissingColumn(String),

    #[error("必填字段为空 (行 {row}, 字段 {field})")]
    MissingField { row: usize, field: String },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    #[error("条件表达式解析失败 (行 {row}, 编码 {code}): {message}")]
    ConditionParseError {
        row: usize,
        code: String,
        message: String,
    },

    #[error("规则编码重复 (行 {row}): {code}")]
    DuplicateCode { row: usize, code: String },

    // ===== 装载错误 =====
    #[error("规则库装载失败: {0}")]
    Engine(#[from] EngineError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(e: std::io::Error) -> Self {
        ImportError::FileReadError(e.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(e: csv::Error) -> Self {
        ImportError::CsvParseError(e.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
