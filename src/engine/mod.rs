// ==========================================
// 八字排盘引擎 - 引擎层
// ==========================================
// 职责: 排盘、旺衰、大运流年、干支关系、规则库与规则匹配
// 约束: 引擎均为纯计算, 不做 IO; 唯一共享可变点是规则库快照指针
// ==========================================

pub mod calendar;
pub mod error;
pub mod luck_period;
pub mod relation;
pub mod rule_matcher;
pub mod rule_store;
pub mod solar_term;
pub mod strength;

// 重导出核心引擎
pub use calendar::CalendarEngine;
pub use error::{EngineError, EngineResult};
pub use luck_period::LuckPeriodEngine;
pub use relation::{RelationAnalyzer, RelationsReport, TenGodEntry};
pub use rule_matcher::{evaluate, ChartFacts, ConditionSkipped, RuleMatcher};
pub use rule_store::{RuleCorpus, RuleStore};
pub use strength::{StrengthBreakdown, StrengthReport, StrengthScorer};
