// ==========================================
// 模块编排集成测试
// ==========================================
// 测试目标:
// 1. 部分失败只标注在失败模块上, 命盘失败则整个请求失败
// 2. 缓存命中与规则库版本失效
// 3. 单模块超时与整体时限
// ==========================================


use bazi_engine::app::AppState;
use bazi_engine::config::{config_keys, ConfigManager, EngineConfig, OrchestratorConfig};
use bazi_engine::importer::LoadMode;
use bazi_engine::engine::RuleStore;
use bazi_engine::logging;
use bazi_engine::orchestrator::{
    MemoryCacheStore, ModuleFailureKind, ModuleKind, ModuleOrchestrator, ModuleRequest,
    OrchestratorError,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{Builder, NamedTempFile};
use test_helpers::{load_corpus, local_service, request, FailingService, SlowService, CORPUS_SIZE};

fn orchestrator(store: Arc<RuleStore>) -> ModuleOrchestrator {
    ModuleOrchestrator::new(&EngineConfig::default(), local_service(store))
}

/// 单条性别规则组成的规则文件
fn gender_rule_file(code: &str, gender: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "code,rule_type,condition,content,version").unwrap();
    writeln!(
        file,
        r#"{},gender,"{{""gender"":{{""gender"":""{}""}}}}",{},1"#,
        code, gender, code
    )
    .unwrap();
    file
}

fn rule_codes(payload: &serde_json::Value, field: &str) -> Vec<String> {
    payload[field]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|r| r["code"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    logging::init_test();

    let failing = Arc::new(FailingService::modules());
    let orch = orchestrator(Arc::new(RuleStore::new()))
        .with_service(ModuleKind::Relations, failing.clone());

    let response = orch
        .execute(request(
            "1990-05-15",
            "14:30",
            "male",
            &["chart", "strength", "relations"],
        ))
        .await
        .unwrap();

    assert_eq!(response.modules.len(), 3);
    assert!(response.module(ModuleKind::Chart).unwrap().is_ok());
    assert!(response.module(ModuleKind::Strength).unwrap().is_ok());
    let failure = response
        .module(ModuleKind::Relations)
        .and_then(|o| o.failure())
        .unwrap();
    assert_eq!(failure.kind, ModuleFailureKind::ComputationFailed);
    assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

    assert_eq!(response.failed_modules(), vec!["relations".to_string()]);
    let err = response.into_complete().unwrap_err();
    assert!(matches!(err, OrchestratorError::PartialResult { ref failed } if failed.len() == 1));
}

#[tokio::test]
async fn test_failed_dependency_skips_dependent_module() {
    let failing = Arc::new(FailingService::modules());
    let store = Arc::new(RuleStore::new());
    load_corpus(&store).await;
    let orch = orchestrator(store).with_service(ModuleKind::Strength, failing.clone());

    let response = orch
        .execute(request("1990-05-15", "14:30", "male", &["rule-matches"]))
        .await
        .unwrap();

    // strength 只作依赖计算, 不出现在响应中
    assert_eq!(response.modules.len(), 1);
    let failure = response
        .module(ModuleKind::RuleMatches)
        .and_then(|o| o.failure())
        .unwrap();
    assert_eq!(failure.kind, ModuleFailureKind::DependencyFailed);
}

#[tokio::test]
async fn test_chart_failure_fails_request() {
    let orch = ModuleOrchestrator::new(&EngineConfig::default(), Arc::new(FailingService::chart()));

    let err = orch
        .execute(request("1990-05-15", "14:30", "male", &["strength"]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::ChartUnavailable(_)));
}

#[tokio::test]
async fn test_invalid_requests_fail_fast() {
    let orch = orchestrator(Arc::new(RuleStore::new()));

    let err = orch
        .execute(request("1990-13-45", "14:30", "male", &["chart"]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidInput(_)));

    let err = orch
        .execute(request("1990-05-15", "14:30", "male", &["palm-reading"]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownModule(_)));

    let mut bad_params = request("1990-05-15", "14:30", "male", &[]);
    bad_params.modules = vec![ModuleRequest::with_params(
        "annual-periods",
        json!({ "year": "next" }),
    )];
    let err = orch.execute(bad_params).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidParams { .. }));
}

#[tokio::test]
async fn test_rule_matches_without_corpus() {
    let orch = orchestrator(Arc::new(RuleStore::new()));
    let response = orch
        .execute(request("1984-03-08", "09:15", "male", &["chart", "rule-matches"]))
        .await
        .unwrap();

    assert!(response.module(ModuleKind::Chart).unwrap().is_ok());
    let failure = response
        .module(ModuleKind::RuleMatches)
        .and_then(|o| o.failure())
        .unwrap();
    assert_eq!(failure.kind, ModuleFailureKind::CorpusUnavailable);
    assert_eq!(response.corpus_version, None);
}

#[tokio::test]
async fn test_cache_hit_and_corpus_version_invalidation() {
    let store = Arc::new(RuleStore::new());
    load_corpus(&store).await;
    let cache = Arc::new(MemoryCacheStore::new());
    let orch = orchestrator(store.clone()).with_cache(cache.clone());
    let modules = ["chart", "rule-matches"];

    let first = orch
        .execute(request("1984-03-08", "09:15", "male", &modules))
        .await
        .unwrap();
    assert!(!first.module(ModuleKind::Chart).unwrap().is_cached());
    assert_eq!(first.corpus_version, Some(1));
    let total = first
        .module(ModuleKind::RuleMatches)
        .and_then(|o| o.payload())
        .map(|p| {
            p["matched"].as_array().map_or(0, |a| a.len())
                + p["unmatched"].as_array().map_or(0, |a| a.len())
        });
    assert_eq!(total, Some(CORPUS_SIZE));

    let second = orch
        .execute(request("1984-03-08", "09:15", "male", &modules))
        .await
        .unwrap();
    assert!(second.module(ModuleKind::Chart).unwrap().is_cached());
    assert!(second.module(ModuleKind::RuleMatches).unwrap().is_cached());
    assert_eq!(
        first.module(ModuleKind::RuleMatches).and_then(|o| o.payload()),
        second.module(ModuleKind::RuleMatches).and_then(|o| o.payload())
    );

    // 热更新后规则匹配重新计算, 命盘仍走缓存
    load_corpus(&store).await;
    let third = orch
        .execute(request("1984-03-08", "09:15", "male", &modules))
        .await
        .unwrap();
    assert!(third.module(ModuleKind::Chart).unwrap().is_cached());
    assert!(!third.module(ModuleKind::RuleMatches).unwrap().is_cached());
    assert_eq!(third.corpus_version, Some(2));

    // 按计算键清除
    let key = orch.parse_key("1984-03-08", "09:15", "male").unwrap();
    assert!(orch.invalidate(&key).await.unwrap() > 0);
    let fourth = orch
        .execute(request("1984-03-08", "09:15", "male", &["chart"]))
        .await
        .unwrap();
    assert!(!fourth.module(ModuleKind::Chart).unwrap().is_cached());
}

#[tokio::test]
async fn test_min_corpus_version_rejects_stale_corpus() {
    let store = Arc::new(RuleStore::new());
    load_corpus(&store).await;
    let orch = orchestrator(store).with_cache(Arc::new(MemoryCacheStore::new()));

    // 先以同样的规则类型写入缓存
    let mut warm = request("1984-03-08", "09:15", "male", &[]);
    warm.modules = vec![ModuleRequest::with_params(
        "rule-matches",
        json!({ "rule_types": ["luck"] }),
    )];
    let warmed = orch.execute(warm.clone()).await.unwrap();
    assert!(warmed.module(ModuleKind::RuleMatches).unwrap().is_ok());
    assert!(orch
        .execute(warm)
        .await
        .unwrap()
        .module(ModuleKind::RuleMatches)
        .unwrap()
        .is_cached());

    // 缓存中有 v1 结果, 但 v1 不满足最低版本 5
    let mut req = request("1984-03-08", "09:15", "male", &[]);
    req.modules = vec![ModuleRequest::with_params(
        "rule-matches",
        json!({ "rule_types": ["luck"], "min_corpus_version": 5 }),
    )];
    let response = orch.execute(req).await.unwrap();
    let failure = response
        .module(ModuleKind::RuleMatches)
        .and_then(|o| o.failure())
        .unwrap();
    assert_eq!(failure.kind, ModuleFailureKind::StaleCorpus);
}

#[tokio::test]
async fn test_sqlite_cache_survives_restart() {
    let temp = NamedTempFile::new().unwrap();
    let db_path = temp.path().to_str().unwrap();
    let modules = ["chart", "strength", "major-periods"];

    {
        let state = AppState::new(db_path).await.unwrap();
        let response = state
            .execute(request("1990-05-15", "14:30", "male", &modules))
            .await
            .unwrap();
        assert!(response.modules.values().all(|o| o.is_ok() && !o.is_cached()));
    }

    let state = AppState::new(db_path).await.unwrap();
    let response = state
        .execute(request("1990-05-15", "14:30", "male", &modules))
        .await
        .unwrap();
    assert!(response.modules.values().all(|o| o.is_cached()));
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn test_sqlite_cache_keyed_by_corpus_content_across_restart() {
    let temp = NamedTempFile::new().unwrap();
    let db_path = temp.path().to_str().unwrap();
    let old_rules = gender_rule_file("OLD-1", "male");
    let new_rules = gender_rule_file("NEW-1", "female");
    let modules = ["rule-matches"];

    {
        let state = AppState::new(db_path).await.unwrap();
        let summary = state
            .load_rules(vec![old_rules.path()], LoadMode::Replace)
            .await
            .unwrap();
        assert_eq!(summary.corpus_version, 1);
        let response = state
            .execute(request("1990-05-15", "14:30", "male", &modules))
            .await
            .unwrap();
        let payload = response.module(ModuleKind::RuleMatches).unwrap().payload().unwrap();
        assert_eq!(rule_codes(payload, "matched"), vec!["OLD-1"]);
    }

    // 新进程装载另一份规则库, 版本号同样从 1 起算
    let state = AppState::new(db_path).await.unwrap();
    let summary = state
        .load_rules(vec![new_rules.path()], LoadMode::Replace)
        .await
        .unwrap();
    assert_eq!(summary.corpus_version, 1);

    let response = state
        .execute(request("1990-05-15", "14:30", "male", &modules))
        .await
        .unwrap();
    let outcome = response.module(ModuleKind::RuleMatches).unwrap();
    assert!(!outcome.is_cached());
    let payload = outcome.payload().unwrap();
    assert!(rule_codes(payload, "matched").is_empty());
    assert_eq!(rule_codes(payload, "unmatched"), vec!["NEW-1"]);

    // 同一份新规则库再次请求则命中缓存
    let again = state
        .execute(request("1990-05-15", "14:30", "male", &modules))
        .await
        .unwrap();
    assert!(again.module(ModuleKind::RuleMatches).unwrap().is_cached());
}

#[tokio::test]
async fn test_sqlite_cache_keyed_by_engine_config() {
    let temp = NamedTempFile::new().unwrap();
    let db_path = temp.path().to_str().unwrap();
    let modules = ["strength"];

    let before = {
        let state = AppState::new(db_path).await.unwrap();
        let response = state
            .execute(request("1990-05-15", "14:30", "male", &modules))
            .await
            .unwrap();
        let outcome = response.module(ModuleKind::Strength).unwrap();
        assert!(!outcome.is_cached());
        outcome.payload().unwrap()["class"].clone()
    };
    assert_eq!(before, json!("strong"));

    {
        let manager = ConfigManager::new(db_path).unwrap();
        manager
            .set_global_config_value(config_keys::STRENGTH_THRESHOLD, "0.6")
            .unwrap();
    }

    // 阈值调整后不得沿用旧参数下的缓存结果
    let state = AppState::new(db_path).await.unwrap();
    let response = state
        .execute(request("1990-05-15", "14:30", "male", &modules))
        .await
        .unwrap();
    let outcome = response.module(ModuleKind::Strength).unwrap();
    assert!(!outcome.is_cached());
    assert_eq!(outcome.payload().unwrap()["class"], json!("weak"));
}

#[tokio::test]
async fn test_module_timeout_marks_only_slow_module() {
    let slow = Arc::new(SlowService::new(Duration::ZERO, Duration::from_millis(500)));
    let config = EngineConfig {
        orchestrator: OrchestratorConfig {
            module_timeout_ms: 50,
            ..OrchestratorConfig::default()
        },
        ..EngineConfig::default()
    };
    let orch = ModuleOrchestrator::new(&config, local_service(Arc::new(RuleStore::new())))
        .with_service(ModuleKind::MajorPeriods, slow);

    let response = orch
        .execute(request(
            "1990-05-15",
            "14:30",
            "male",
            &["strength", "major-periods"],
        ))
        .await
        .unwrap();

    assert!(response.module(ModuleKind::Strength).unwrap().is_ok());
    let failure = response
        .module(ModuleKind::MajorPeriods)
        .and_then(|o| o.failure())
        .unwrap();
    assert_eq!(failure.kind, ModuleFailureKind::Timeout);
}

#[tokio::test]
async fn test_request_deadline() {
    let slow = Arc::new(SlowService::new(Duration::from_secs(2), Duration::ZERO));
    let orch = ModuleOrchestrator::new(&EngineConfig::default(), slow);

    let err = orch
        .execute_with_deadline(
            request("1990-05-15", "14:30", "male", &["chart"]),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::RequestTimedOut { timeout_ms: 50 }));
}

#[tokio::test]
async fn test_in_memory_app_state_end_to_end() {
    let state = AppState::in_memory(EngineConfig::default());
    state
        .load_rules(vec![test_helpers::CORPUS_PATH], bazi_engine::importer::LoadMode::Replace)
        .await
        .unwrap();

    let response = state
        .execute(request(
            "1990-05-15",
            "14:30",
            "male",
            &["chart", "strength", "major-periods", "annual-periods", "relations", "rule-matches"],
        ))
        .await
        .unwrap()
        .into_complete()
        .unwrap();

    let chart = response.module(ModuleKind::Chart).and_then(|o| o.payload()).unwrap();
    assert_eq!(chart["day"], json!("庚辰"));
    let strength = response.module(ModuleKind::Strength).and_then(|o| o.payload()).unwrap();
    assert_eq!(strength["class"], json!("strong"));
    assert_eq!(response.corpus_version, Some(1));
}
