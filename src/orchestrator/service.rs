// ==========================================
// 八字排盘引擎 - 模块计算服务
// ==========================================
// 职责: 定义模块计算服务接口, 并提供进程内实现
// 说明: 编排器只依赖 ModuleService trait, 远程部署的计算服务实现同一 trait 即可接入
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::chart::Chart;
use crate::domain::rule::CorpusStamp;
use crate::engine::{
    CalendarEngine, ChartFacts, LuckPeriodEngine, RelationAnalyzer, RuleMatcher, RuleStore,
    StrengthReport, StrengthScorer,
};
use crate::orchestrator::error::{ServiceError, ServiceResult};
use crate::orchestrator::module::{ComputationKey, ModuleKind, ModuleParams};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

// ==========================================
// ModuleContext - 下游模块可用的上游结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ModuleContext {
    pub key: ComputationKey,
    pub chart: Arc<Chart>,
    /// strength 模块结果（未计划或失败时为 None）
    pub strength: Option<Arc<StrengthReport>>,
}

// ==========================================
// ModuleService Trait
// ==========================================
#[async_trait]
pub trait ModuleService: Send + Sync {
    /// 服务名（用于日志）
    fn name(&self) -> &str;

    /// 第 1 层: 排盘
    async fn compute_chart(&self, key: &ComputationKey) -> ServiceResult<Value>;

    /// 第 2/3 层模块
    async fn compute_module(
        &self,
        kind: ModuleKind,
        ctx: &ModuleContext,
        params: &ModuleParams,
    ) -> ServiceResult<Value>;

    /// 当前规则库版本与内容指纹（用于 rule-matches 缓存键; 未装载为 None）
    async fn corpus_stamp(&self) -> ServiceResult<Option<CorpusStamp>>;
}

// ==========================================
// LocalModuleService - 进程内实现
// ==========================================
pub struct LocalModuleService {
    calendar: CalendarEngine,
    luck: LuckPeriodEngine,
    scorer: StrengthScorer,
    relations: RelationAnalyzer,
    matcher: RuleMatcher,
    store: Arc<RuleStore>,
}

impl LocalModuleService {
    pub fn new(config: &EngineConfig, store: Arc<RuleStore>) -> Self {
        Self {
            calendar: CalendarEngine::new(config.calendar.clone()),
            luck: LuckPeriodEngine::new(config.calendar.clone(), config.luck.clone()),
            scorer: StrengthScorer::new(config.strength.clone()),
            relations: RelationAnalyzer::new(),
            matcher: RuleMatcher::new(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    fn rule_matches(&self, ctx: &ModuleContext, params: &ModuleParams) -> ServiceResult<Value> {
        let strength = ctx
            .strength
            .as_ref()
            .ok_or_else(|| ServiceError::MissingDependency(ModuleKind::Strength.to_string()))?;

        let (rule_types, year, min_version) = match params {
            ModuleParams::RuleMatches(p) => (p.rule_types.as_slice(), p.year, p.min_corpus_version),
            _ => (&[][..], None, None),
        };

        let current_major = year.and_then(|y| {
            let periods = self.luck.major_periods(&ctx.chart, None);
            self.luck.current_major(&periods, y)
        });

        let facts = ChartFacts::new(&ctx.chart, strength).with_current_major(current_major);
        let result = self
            .matcher
            .match_latest(&self.store, &facts, rule_types, min_version)?;
        Ok(serde_json::to_value(result)?)
    }
}

#[async_trait]
impl ModuleService for LocalModuleService {
    fn name(&self) -> &str {
        "local"
    }

    async fn compute_chart(&self, key: &ComputationKey) -> ServiceResult<Value> {
        let chart = self.calendar.compute_chart(&key.birth)?;
        Ok(serde_json::to_value(chart)?)
    }

    async fn compute_module(
        &self,
        kind: ModuleKind,
        ctx: &ModuleContext,
        params: &ModuleParams,
    ) -> ServiceResult<Value> {
        debug!(module = %kind, key = %ctx.key, "本地计算模块");
        let chart = ctx.chart.as_ref();

        match kind {
            ModuleKind::Chart => Ok(serde_json::to_value(chart)?),
            ModuleKind::Strength => Ok(serde_json::to_value(self.scorer.score(chart))?),
            ModuleKind::MajorPeriods => {
                let count = match params {
                    ModuleParams::MajorPeriods(p) => p.count,
                    _ => None,
                };
                Ok(serde_json::to_value(self.luck.major_periods(chart, count))?)
            }
            ModuleKind::AnnualPeriods => {
                let (year, include_neighbors) = match params {
                    ModuleParams::AnnualPeriods(p) => (p.year, p.include_neighbors),
                    _ => (None, false),
                };
                let periods = self.luck.major_periods(chart, None);
                let view = self
                    .luck
                    .annual_view(chart, &periods, year, include_neighbors);
                Ok(serde_json::to_value(view)?)
            }
            ModuleKind::Relations => Ok(serde_json::to_value(self.relations.analyze(chart))?),
            ModuleKind::RuleMatches => self.rule_matches(ctx, params),
        }
    }

    async fn corpus_stamp(&self) -> ServiceResult<Option<CorpusStamp>> {
        Ok(self.store.current_stamp())
    }
}
