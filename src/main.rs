// ==========================================
// 八字排盘引擎 - 命令行入口
// ==========================================
// 用法:
//   bazi-engine <YYYY-MM-DD> <HH:MM|unknown> <male|female> [模块,逗号分隔] [规则文件] [数据库路径]
// 示例:
//   bazi-engine 1990-05-15 14:30 male chart,strength,rule-matches data/rule_corpus.csv
// 输出: 合并后的 JSON 响应（stdout）, 日志写 stderr
// ==========================================

use anyhow::{bail, Context};
use bazi_engine::app::AppState;
use bazi_engine::config::EngineConfig;
use bazi_engine::importer::LoadMode;
use bazi_engine::orchestrator::{ComputationRequest, ModuleKind, ModuleRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bazi_engine::logging::init();

    let mut args = std::env::args().skip(1);
    let (Some(date), Some(time), Some(gender)) = (args.next(), args.next(), args.next()) else {
        bail!("用法: bazi-engine <YYYY-MM-DD> <HH:MM|unknown> <male|female> [模块] [规则文件] [数据库路径]");
    };

    let modules: Vec<ModuleRequest> = match args.next().filter(|s| !s.trim().is_empty()) {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ModuleRequest::new)
            .collect(),
        None => ModuleKind::ALL
            .iter()
            .filter(|k| **k != ModuleKind::RuleMatches)
            .map(|k| ModuleRequest::new(k.as_str()))
            .collect(),
    };
    let rules_path = args.next().filter(|s| !s.trim().is_empty());
    let db_path = args.next().filter(|s| !s.trim().is_empty());

    tracing::info!(version = bazi_engine::VERSION, "{}", bazi_engine::APP_NAME);

    let state = match db_path {
        Some(path) => AppState::new(&path)
            .await
            .map_err(anyhow::Error::msg)
            .context("无法初始化AppState")?,
        None => AppState::in_memory(EngineConfig::default()),
    };

    if let Some(path) = rules_path {
        let summary = state
            .load_rules(vec![path.as_str()], LoadMode::Replace)
            .await
            .with_context(|| format!("规则文件装载失败: {}", path))?;
        tracing::info!(
            corpus_version = summary.corpus_version,
            rules = summary.rules,
            "规则库已装载"
        );
    }

    let response = state
        .execute(ComputationRequest {
            date,
            time,
            gender,
            modules,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
