// ==========================================
// 八字排盘引擎 - 规则导入层
// ==========================================
// 职责: 外部规则表格导入, 生成规则并装载到规则库
// 支持: Excel, CSV
// ==========================================

pub mod error;
pub mod file_parser;
pub mod rule_importer;

pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRecord, UniversalFileParser};
pub use rule_importer::{ImportSummary, LoadMode, RuleBatch, RuleImporter};
