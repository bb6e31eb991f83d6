// ==========================================
// 八字排盘引擎 - 模块定义与计算键
// ==========================================
// 模块分层:
// - 第 1 层: chart
// - 第 2 层: strength / major-periods / annual-periods / relations（依赖 chart）
// - 第 3 层: rule-matches（依赖 chart + strength）
// 缓存键: bazi:v1:cfg={参数指纹}:{date}:{time|unknown}:{gender}:{module}:{params}[:corpus=v{版本}-{内容指纹}]
// ==========================================

use crate::config::engine_config::MAX_MAJOR_PERIOD_COUNT;
use crate::domain::chart::BirthInput;
use crate::domain::rule::CorpusStamp;
use crate::orchestrator::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// 缓存键前缀（含格式版本）
pub const CACHE_KEY_PREFIX: &str = "bazi:v1";

// ==========================================
// ModuleKind - 模块名
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    Chart,
    Strength,
    MajorPeriods,
    AnnualPeriods,
    Relations,
    RuleMatches,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 6] = [
        ModuleKind::Chart,
        ModuleKind::Strength,
        ModuleKind::MajorPeriods,
        ModuleKind::AnnualPeriods,
        ModuleKind::Relations,
        ModuleKind::RuleMatches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Chart => "chart",
            ModuleKind::Strength => "strength",
            ModuleKind::MajorPeriods => "major-periods",
            ModuleKind::AnnualPeriods => "annual-periods",
            ModuleKind::Relations => "relations",
            ModuleKind::RuleMatches => "rule-matches",
        }
    }

    /// 所在依赖层（1 起）
    pub fn tier(&self) -> u8 {
        match self {
            ModuleKind::Chart => 1,
            ModuleKind::Strength
            | ModuleKind::MajorPeriods
            | ModuleKind::AnnualPeriods
            | ModuleKind::Relations => 2,
            ModuleKind::RuleMatches => 3,
        }
    }

    /// 直接依赖
    pub fn depends_on(&self) -> &'static [ModuleKind] {
        match self {
            ModuleKind::Chart => &[],
            ModuleKind::Strength
            | ModuleKind::MajorPeriods
            | ModuleKind::AnnualPeriods
            | ModuleKind::Relations => &[ModuleKind::Chart],
            ModuleKind::RuleMatches => &[ModuleKind::Chart, ModuleKind::Strength],
        }
    }

    /// 结果是否依赖规则库版本
    pub fn is_corpus_bound(&self) -> bool {
        matches!(self, ModuleKind::RuleMatches)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        ModuleKind::ALL
            .iter()
            .find(|k| k.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("未知模块: {}", s))
    }
}

/// 请求模块及其全部传递依赖
pub fn with_dependencies(requested: &BTreeSet<ModuleKind>) -> BTreeSet<ModuleKind> {
    let mut planned = requested.clone();
    let mut stack: Vec<ModuleKind> = requested.iter().copied().collect();
    while let Some(kind) = stack.pop() {
        for dep in kind.depends_on() {
            if planned.insert(*dep) {
                stack.push(*dep);
            }
        }
    }
    planned
}

// ==========================================
// 模块参数
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MajorPeriodsParams {
    /// 推排步数（缺省取配置值; 1..=MAX_MAJOR_PERIOD_COUNT）
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnualPeriodsParams {
    /// 参照年（缺省返回全部大运的流年）
    pub year: Option<i32>,
    /// 附带参照年所在大运的前后各一步
    pub include_neighbors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleMatchParams {
    /// 限定规则类型（空 = 全部）
    pub rule_types: Vec<String>,
    /// 参照年（用于当前大运相关条件）
    pub year: Option<i32>,
    /// 要求的最低规则库版本（不参与缓存键）
    #[serde(skip_serializing)]
    pub min_corpus_version: Option<u64>,
}

/// 已校验的模块参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleParams {
    Empty,
    MajorPeriods(MajorPeriodsParams),
    AnnualPeriods(AnnualPeriodsParams),
    RuleMatches(RuleMatchParams),
}

impl ModuleParams {
    /// 按模块解析原始 JSON 参数（null 视为空对象）
    pub fn parse(kind: ModuleKind, raw: &Value) -> OrchestratorResult<Self> {
        let raw = if raw.is_null() {
            Value::Object(Default::default())
        } else {
            raw.clone()
        };
        let invalid = |e: serde_json::Error| OrchestratorError::InvalidParams {
            module: kind.as_str().to_string(),
            message: e.to_string(),
        };

        match kind {
            ModuleKind::MajorPeriods => {
                let params: MajorPeriodsParams = serde_json::from_value(raw).map_err(invalid)?;
                if let Some(count) = params.count {
                    if !(1..=MAX_MAJOR_PERIOD_COUNT).contains(&count) {
                        return Err(OrchestratorError::InvalidParams {
                            module: kind.as_str().to_string(),
                            message: format!(
                                "count 须在 1..={} 之间, 实际 {}",
                                MAX_MAJOR_PERIOD_COUNT, count
                            ),
                        });
                    }
                }
                Ok(ModuleParams::MajorPeriods(params))
            }
            ModuleKind::AnnualPeriods => Ok(ModuleParams::AnnualPeriods(
                serde_json::from_value(raw).map_err(invalid)?,
            )),
            ModuleKind::RuleMatches => {
                let mut params: RuleMatchParams = serde_json::from_value(raw).map_err(invalid)?;
                let types: BTreeSet<String> = params
                    .rule_types
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                params.rule_types = types.into_iter().collect();
                Ok(ModuleParams::RuleMatches(params))
            }
            ModuleKind::Chart | ModuleKind::Strength | ModuleKind::Relations => {
                match raw.as_object() {
                    Some(map) if map.is_empty() => Ok(ModuleParams::Empty),
                    _ => Err(OrchestratorError::InvalidParams {
                        module: kind.as_str().to_string(),
                        message: "该模块不接受参数".to_string(),
                    }),
                }
            }
        }
    }

    /// 规范化参数文本（字段顺序固定, 用于缓存键）
    pub fn canonical(&self) -> String {
        let value = match self {
            ModuleParams::Empty => Ok(Value::Object(Default::default())),
            ModuleParams::MajorPeriods(p) => serde_json::to_value(p),
            ModuleParams::AnnualPeriods(p) => serde_json::to_value(p),
            ModuleParams::RuleMatches(p) => serde_json::to_value(p),
        };
        value.map(|v| v.to_string()).unwrap_or_else(|_| "{}".to_string())
    }
}

// ==========================================
// ModuleRequest - 入站模块请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRequest {
    pub module: String,
    #[serde(default)]
    pub params: Value,
}

impl ModuleRequest {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(module: impl Into<String>, params: Value) -> Self {
        Self {
            module: module.into(),
            params,
        }
    }
}

// ==========================================
// ComputationKey - 计算键
// ==========================================
/// 命盘与各模块结果都是 (日期, 时间, 性别) 在给定引擎参数下的纯函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputationKey {
    pub birth: BirthInput,
    /// 引擎参数指纹（见 EngineConfig::fingerprint）
    pub config_fingerprint: u64,
}

impl ComputationKey {
    pub fn new(birth: BirthInput, config_fingerprint: u64) -> Self {
        Self {
            birth,
            config_fingerprint,
        }
    }

    fn time_text(&self) -> String {
        self.birth
            .time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// 本计算键下全部缓存条目的公共前缀
    pub fn cache_prefix(&self) -> String {
        format!(
            "{}:cfg={:016x}:{}:{}:{}:",
            CACHE_KEY_PREFIX,
            self.config_fingerprint,
            self.birth.date.format("%Y-%m-%d"),
            self.time_text(),
            self.birth.gender.as_str()
        )
    }

    /// 模块结果缓存键（规则库相关模块附加版本与内容指纹）
    pub fn cache_key(
        &self,
        module: ModuleKind,
        params: &ModuleParams,
        corpus: Option<&CorpusStamp>,
    ) -> String {
        let mut key = format!("{}{}:{}", self.cache_prefix(), module.as_str(), params.canonical());
        if module.is_corpus_bound() {
            if let Some(stamp) = corpus {
                key.push_str(&format!(":corpus={}", stamp));
            }
        }
        key
    }
}

impl fmt::Display for ComputationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}T{}/{}",
            self.birth.date.format("%Y-%m-%d"),
            self.time_text(),
            self.birth.gender.as_str()
        )
    }
}
