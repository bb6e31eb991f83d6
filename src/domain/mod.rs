// ==========================================
// 八字排盘引擎 - 领域模型层
// ==========================================
// 职责: 定义干支、命盘、大运、规则等领域实体
// 红线: 不含计算流程, 不含缓存与编排逻辑
// ==========================================

pub mod chart;
pub mod luck;
pub mod pillar;
pub mod relation;
pub mod rule;
pub mod types;

// 重导出核心类型
pub use chart::{BirthInput, Chart, HiddenStems};
pub use luck::{AnnualPeriod, AnnualPeriodsView, LuckPeriods, LuckStart, MajorPeriod, MajorWithAnnuals};
pub use pillar::{Pillar, SEXAGENARY_CYCLE};
pub use relation::{PillarRelation, RelationKind};
pub use rule::{Condition, CorpusStamp, MatchResult, MatchedRule, Rule, UnmatchedReason, UnmatchedRule};
pub use types::{
    Branch, Element, ElementRelation, Gender, LuckDirection, PillarPart, PillarPosition, Polarity,
    Stem, StrengthClass, TenGod,
};
