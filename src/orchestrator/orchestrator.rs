// ==========================================
// 八字排盘引擎 - 模块编排器
// ==========================================
// 流程:
// 1. 解析计算键与模块列表（输入非法 → 整个请求失败）
// 2. 补齐依赖模块（计算但不返回）
// 3. 按层执行: 同层模块并发（join_all）, 下一层等上一层完成
// 4. 第 1 层（命盘）失败 → 整个请求失败; 其余模块失败只标注在该模块上
// 缓存: 命中直接返回; 未命中落到实时计算; 缓存错误转为警告
// 缓存键含引擎参数指纹与规则库内容指纹, 进程重启或参数变化后不会读到旧结果
// ==========================================

use crate::config::engine_config::{EngineConfig, OrchestratorConfig};
use crate::domain::chart::Chart;
use crate::domain::rule::CorpusStamp;
use crate::engine::{CalendarEngine, EngineError, StrengthReport};
use crate::orchestrator::cache::CacheStore;
use crate::orchestrator::error::{
    ModuleFailure, ModuleFailureKind, OrchestratorError, OrchestratorResult, ServiceResult,
};
use crate::orchestrator::module::{
    with_dependencies, ComputationKey, ModuleKind, ModuleParams, ModuleRequest,
};
use crate::orchestrator::service::{ModuleContext, ModuleService};
use crate::perf::PerfGuard;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// 请求与响应
// ==========================================

/// 入站计算请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationRequest {
    /// "YYYY-MM-DD"
    pub date: String,
    /// "HH:MM"; 空串 / "unknown" 表示时辰不详
    #[serde(default)]
    pub time: String,
    pub gender: String,
    pub modules: Vec<ModuleRequest>,
}

/// 单模块结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleOutcome {
    Ok { payload: Value, cached: bool },
    Failed { error: ModuleFailure },
}

impl ModuleOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ModuleOutcome::Ok { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            ModuleOutcome::Ok { payload, .. } => Some(payload),
            ModuleOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&ModuleFailure> {
        match self {
            ModuleOutcome::Ok { .. } => None,
            ModuleOutcome::Failed { error } => Some(error),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, ModuleOutcome::Ok { cached: true, .. })
    }
}

/// 合并后的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationResponse {
    pub request_id: Uuid,
    pub computation_key: String,
    /// 模块名 → 结果（只含请求的模块）
    pub modules: BTreeMap<String, ModuleOutcome>,
    /// rule-matches 实际使用的规则库版本
    pub corpus_version: Option<u64>,
    /// 非致命问题（缓存读写失败等）
    pub warnings: Vec<String>,
}

impl ComputationResponse {
    pub fn module(&self, kind: ModuleKind) -> Option<&ModuleOutcome> {
        self.modules.get(kind.as_str())
    }

    pub fn failed_modules(&self) -> Vec<String> {
        self.modules
            .iter()
            .filter(|(_, outcome)| !outcome.is_ok())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_partial(&self) -> bool {
        self.modules.values().any(|o| !o.is_ok())
    }

    /// 要求全部模块成功, 否则返回 PartialResult
    pub fn into_complete(self) -> OrchestratorResult<Self> {
        if self.is_partial() {
            return Err(OrchestratorError::PartialResult {
                failed: self.failed_modules(),
            });
        }
        Ok(self)
    }
}

/// 单个模块执行记录（含警告）
struct ModuleRun {
    kind: ModuleKind,
    outcome: ModuleOutcome,
    warnings: Vec<String>,
}

// ==========================================
// ModuleOrchestrator - 模块编排器
// ==========================================
pub struct ModuleOrchestrator {
    calendar: CalendarEngine,
    config: OrchestratorConfig,
    /// 引擎参数指纹（写入计算键）
    config_fingerprint: u64,
    default_service: Arc<dyn ModuleService>,
    overrides: HashMap<ModuleKind, Arc<dyn ModuleService>>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl ModuleOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - config: 历法参数用于解析计算键, 编排参数控制超时与缓存, 全部结果相关参数计入缓存键
    /// - default_service: 未单独注册的模块都由它计算
    pub fn new(config: &EngineConfig, default_service: Arc<dyn ModuleService>) -> Self {
        Self {
            calendar: CalendarEngine::new(config.calendar.clone()),
            config: config.orchestrator.clone(),
            config_fingerprint: config.fingerprint(),
            default_service,
            overrides: HashMap::new(),
            cache: None,
        }
    }

    /// 挂接缓存
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 为某个模块注册独立服务
    pub fn with_service(mut self, kind: ModuleKind, service: Arc<dyn ModuleService>) -> Self {
        self.overrides.insert(kind, service);
        self
    }

    fn service_for(&self, kind: ModuleKind) -> &Arc<dyn ModuleService> {
        self.overrides.get(&kind).unwrap_or(&self.default_service)
    }

    fn active_cache(&self) -> Option<&Arc<dyn CacheStore>> {
        if self.config.cache_enabled {
            self.cache.as_ref()
        } else {
            None
        }
    }

    fn module_timeout(&self) -> Duration {
        Duration::from_millis(self.config.module_timeout_ms.max(1))
    }

    /// 解析计算键（日期/时间/性别非法时失败）
    pub fn parse_key(&self, date: &str, time: &str, gender: &str) -> OrchestratorResult<ComputationKey> {
        let birth = self
            .calendar
            .parse_input(date, time, gender)
            .map_err(|e| match e {
                EngineError::InvalidInput(msg) => OrchestratorError::InvalidInput(msg),
                other => OrchestratorError::InvalidInput(other.to_string()),
            })?;
        Ok(ComputationKey::new(birth, self.config_fingerprint))
    }

    /// 解析模块列表与参数
    fn parse_modules(
        requests: &[ModuleRequest],
    ) -> OrchestratorResult<BTreeMap<ModuleKind, ModuleParams>> {
        if requests.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "至少需要请求一个模块".to_string(),
            ));
        }

        let mut parsed = BTreeMap::new();
        for req in requests {
            let kind: ModuleKind = req
                .module
                .parse()
                .map_err(|_| OrchestratorError::UnknownModule(req.module.clone()))?;
            let params = ModuleParams::parse(kind, &req.params)?;
            if parsed.insert(kind, params).is_some() {
                return Err(OrchestratorError::InvalidInput(format!(
                    "模块重复请求: {}",
                    kind
                )));
            }
        }
        Ok(parsed)
    }

    /// 执行计算请求
    pub async fn execute(
        &self,
        request: ComputationRequest,
    ) -> OrchestratorResult<ComputationResponse> {
        let perf = PerfGuard::new("orchestrator.execute");
        let request_id = Uuid::new_v4();

        let key = self.parse_key(&request.date, &request.time, &request.gender)?;
        let mut requested = Self::parse_modules(&request.modules)?;
        let requested_kinds: BTreeSet<ModuleKind> = requested.keys().copied().collect();
        let planned = with_dependencies(&requested_kinds);

        info!(
            request_id = %request_id,
            key = %key,
            requested = requested_kinds.len(),
            planned = planned.len(),
            "开始执行计算请求"
        );

        let mut outcomes: BTreeMap<ModuleKind, ModuleOutcome> = BTreeMap::new();
        let mut warnings = Vec::new();

        // ==========================================
        // 第 1 层: 命盘（失败即终止）
        // ==========================================
        let chart_params = requested.remove(&ModuleKind::Chart).unwrap_or(ModuleParams::Empty);
        let chart_run = self.run_chart(&key, &chart_params, &perf).await;
        warnings.extend(chart_run.warnings);

        let chart_value = match chart_run.outcome {
            ModuleOutcome::Ok { ref payload, .. } => payload.clone(),
            ModuleOutcome::Failed { error } => {
                warn!(request_id = %request_id, error = %error, "命盘计算失败, 请求终止");
                return Err(OrchestratorError::ChartUnavailable(error));
            }
        };
        let chart: Arc<Chart> = Arc::new(serde_json::from_value(chart_value).map_err(|e| {
            OrchestratorError::ChartUnavailable(ModuleFailure::new(
                ModuleFailureKind::ComputationFailed,
                format!("命盘结果无法解析: {}", e),
            ))
        })?);
        outcomes.insert(ModuleKind::Chart, chart_run.outcome);

        let mut ctx = ModuleContext {
            key,
            chart,
            strength: None,
        };

        // ==========================================
        // 第 2、3 层: 同层并发
        // ==========================================
        for tier in 2..=3u8 {
            let tier_modules: Vec<ModuleKind> =
                planned.iter().copied().filter(|k| k.tier() == tier).collect();
            if tier_modules.is_empty() {
                continue;
            }
            debug!(tier, modules = ?tier_modules, "分发本层模块");

            let tasks = tier_modules.iter().map(|kind| {
                let params = requested.get(kind).cloned().unwrap_or(ModuleParams::Empty);
                self.run_module(*kind, &ctx, &outcomes, params, &perf)
            });
            let runs = join_all(tasks).await;

            for run in runs {
                warnings.extend(run.warnings);
                if run.kind == ModuleKind::Strength {
                    ctx.strength = extract_strength(&run.outcome);
                }
                outcomes.insert(run.kind, run.outcome);
            }
        }

        let corpus_version = outcomes
            .get(&ModuleKind::RuleMatches)
            .and_then(|o| o.payload())
            .and_then(|p| p.get("corpus_version"))
            .and_then(|v| v.as_u64());

        let modules: BTreeMap<String, ModuleOutcome> = outcomes
            .into_iter()
            .filter(|(kind, _)| requested_kinds.contains(kind))
            .map(|(kind, outcome)| (kind.as_str().to_string(), outcome))
            .collect();

        let response = ComputationResponse {
            request_id,
            computation_key: key.to_string(),
            modules,
            corpus_version,
            warnings,
        };

        info!(
            request_id = %request_id,
            failed = response.failed_modules().len(),
            warnings = response.warnings.len(),
            elapsed_ms = perf.elapsed_ms(),
            "计算请求完成"
        );
        Ok(response)
    }

    /// 带整体时限执行; 超时后放弃所有未完成的模块计算
    pub async fn execute_with_deadline(
        &self,
        request: ComputationRequest,
        deadline: Duration,
    ) -> OrchestratorResult<ComputationResponse> {
        match tokio::time::timeout(deadline, self.execute(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = deadline.as_millis() as u64, "计算请求超时");
                Err(OrchestratorError::RequestTimedOut {
                    timeout_ms: deadline.as_millis() as u64,
                })
            }
        }
    }

    /// 清除某计算键的全部缓存
    pub async fn invalidate(&self, key: &ComputationKey) -> OrchestratorResult<usize> {
        match &self.cache {
            Some(cache) => cache
                .invalidate_prefix(&key.cache_prefix())
                .await
                .map_err(|e| OrchestratorError::Other(anyhow::anyhow!(e))),
            None => Ok(0),
        }
    }

    // ==========================================
    // 单模块执行
    // ==========================================

    async fn run_chart(
        &self,
        key: &ComputationKey,
        params: &ModuleParams,
        perf: &PerfGuard,
    ) -> ModuleRun {
        let service = self.service_for(ModuleKind::Chart).clone();
        let cache_key = key.cache_key(ModuleKind::Chart, params, None);
        self.cached_or_compute(ModuleKind::Chart, Some(cache_key), perf, async move {
            service.compute_chart(key).await
        })
        .await
    }

    async fn run_module(
        &self,
        kind: ModuleKind,
        ctx: &ModuleContext,
        done: &BTreeMap<ModuleKind, ModuleOutcome>,
        params: ModuleParams,
        perf: &PerfGuard,
    ) -> ModuleRun {
        // 依赖未成功则不发起调用
        for dep in kind.depends_on() {
            if let Some(ModuleOutcome::Failed { error }) = done.get(dep) {
                return ModuleRun {
                    kind,
                    outcome: ModuleOutcome::Failed {
                        error: ModuleFailure::new(
                            ModuleFailureKind::DependencyFailed,
                            format!("依赖模块 {} 失败: {}", dep, error.message),
                        ),
                    },
                    warnings: Vec::new(),
                };
            }
        }

        let service = self.service_for(kind).clone();
        let mut warnings = Vec::new();

        let lookup_stamp = if kind.is_corpus_bound() {
            match service.corpus_stamp().await {
                Ok(stamp) => stamp,
                Err(e) => {
                    warnings.push(format!("{}: 规则库版本读取失败, 跳过缓存: {}", kind, e));
                    None
                }
            }
        } else {
            None
        };
        // 规则库未装载、版本不可知或低于请求的最低版本时不读缓存, 由计算给出结果或 StaleCorpus
        let cache_key = if kind.is_corpus_bound()
            && !corpus_satisfies(lookup_stamp.as_ref(), &params)
        {
            None
        } else {
            Some(ctx.key.cache_key(kind, &params, lookup_stamp.as_ref()))
        };

        let mut run = self
            .cached_or_compute(kind, cache_key, perf, async {
                service.compute_module(kind, ctx, &params).await
            })
            .await;

        // 实际使用的版本可能比查询时更新, 按实际版本回写
        if let (Some(cache), ModuleOutcome::Ok { payload, cached: false }) =
            (self.active_cache(), &run.outcome)
        {
            if kind.is_corpus_bound() {
                if let Some(actual) = payload_stamp(payload) {
                    if Some(&actual) != lookup_stamp.as_ref() {
                        let key = ctx.key.cache_key(kind, &params, Some(&actual));
                        if let Err(e) = cache.set(&key, payload).await {
                            run.warnings.push(format!("{}: 缓存写入失败: {}", kind, e));
                        }
                    }
                }
            }
        }

        warnings.append(&mut run.warnings);
        run.warnings = warnings;
        run
    }

    /// 读缓存 → 未命中则带超时计算 → 成功后写缓存
    async fn cached_or_compute<F>(
        &self,
        kind: ModuleKind,
        cache_key: Option<String>,
        perf: &PerfGuard,
        compute: F,
    ) -> ModuleRun
    where
        F: std::future::Future<Output = ServiceResult<Value>>,
    {
        perf.add_module();
        let mut warnings = Vec::new();
        let cache = self.active_cache().zip(cache_key.as_deref());

        if let Some((cache, key)) = cache {
            match cache.get(key).await {
                Ok(Some(payload)) => {
                    perf.add_cache_hit();
                    debug!(module = %kind, "缓存命中");
                    return ModuleRun {
                        kind,
                        outcome: ModuleOutcome::Ok {
                            payload,
                            cached: true,
                        },
                        warnings,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(module = %kind, error = %e, "缓存读取失败, 回落实时计算");
                    warnings.push(format!("{}: 缓存读取失败: {}", kind, e));
                }
            }
        }

        let timeout = self.module_timeout();
        let outcome = match tokio::time::timeout(timeout, compute).await {
            Ok(Ok(payload)) => {
                if let Some((cache, key)) = cache {
                    if let Err(e) = cache.set(key, &payload).await {
                        warn!(module = %kind, error = %e, "缓存写入失败");
                        warnings.push(format!("{}: 缓存写入失败: {}", kind, e));
                    }
                }
                ModuleOutcome::Ok {
                    payload,
                    cached: false,
                }
            }
            Ok(Err(e)) => {
                warn!(module = %kind, error = %e, "模块计算失败");
                ModuleOutcome::Failed { error: e.into() }
            }
            Err(_) => {
                warn!(module = %kind, timeout_ms = timeout.as_millis() as u64, "模块计算超时");
                ModuleOutcome::Failed {
                    error: ModuleFailure::new(
                        ModuleFailureKind::Timeout,
                        format!("超过 {}ms 未返回", timeout.as_millis()),
                    ),
                }
            }
        };

        ModuleRun {
            kind,
            outcome,
            warnings,
        }
    }
}

/// 当前规则库是否满足请求的最低版本（未装载视为不满足）
fn corpus_satisfies(stamp: Option<&CorpusStamp>, params: &ModuleParams) -> bool {
    let min_version = match params {
        ModuleParams::RuleMatches(p) => p.min_corpus_version,
        _ => None,
    };
    match (stamp, min_version) {
        (None, _) => false,
        (Some(stamp), Some(min)) => stamp.version >= min,
        (Some(_), None) => true,
    }
}

/// rule-matches 结果中记录的规则库标识
fn payload_stamp(payload: &Value) -> Option<CorpusStamp> {
    Some(CorpusStamp {
        version: payload.get("corpus_version")?.as_u64()?,
        fingerprint: payload.get("corpus_fingerprint")?.as_str()?.to_string(),
    })
}

fn extract_strength(outcome: &ModuleOutcome) -> Option<Arc<StrengthReport>> {
    let payload = outcome.payload()?;
    match serde_json::from_value::<StrengthReport>(payload.clone()) {
        Ok(report) => Some(Arc::new(report)),
        Err(e) => {
            warn!(error = %e, "strength 结果无法解析");
            None
        }
    }
}
