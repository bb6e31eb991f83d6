// ==========================================
// 八字排盘引擎 - 规则导入器
// ==========================================
// 流程: 文件解析 → 列名映射（兼容中文表头）→ 字段校验 → Rule
// 装载: 整体替换（reload）或按编码增量覆盖（upsert）, 各发布为一个新版本
// ==========================================

use crate::domain::rule::{Condition, Rule};
use crate::engine::rule_store::RuleStore;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{FileParser, RawRecord, UniversalFileParser};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// 标准列名 → 可接受的表头写法
const COLUMN_ALIASES: [(&str, &[&str]); 5] = [
    ("code", &["code", "rule_code", "编码", "规则编码"]),
    ("rule_type", &["rule_type", "type", "类型", "规则类型"]),
    ("condition", &["condition", "条件", "条件表达式"]),
    ("content", &["content", "内容", "规则内容"]),
    ("version", &["version", "版本", "版本号"]),
];

/// 装载方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// 整体替换
    Replace,
    /// 按编码新增/覆盖
    Upsert,
}

/// 单文件导入结果
#[derive(Debug, Clone)]
pub struct RuleBatch {
    pub source: PathBuf,
    pub rules: Vec<Rule>,
}

/// 装载汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub corpus_version: u64,
    pub files: usize,
    pub rules: usize,
    /// 规则类型 → 条数
    pub by_type: BTreeMap<String, usize>,
}

// ==========================================
// RuleImporter - 规则导入器
// ==========================================
pub struct RuleImporter<P = UniversalFileParser>
where
    P: FileParser,
{
    parser: P,
}

impl Default for RuleImporter<UniversalFileParser> {
    fn default() -> Self {
        Self::new(UniversalFileParser)
    }
}

impl<P> RuleImporter<P>
where
    P: FileParser,
{
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    /// 原始行 → 规则（单文件内编码唯一）
    pub fn map_records(records: &[RawRecord]) -> ImportResult<Vec<Rule>> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut rules = Vec::with_capacity(records.len());

        for record in records {
            let row = record.row;
            let rule = Self::map_record(row, record)?;
            if !seen.insert(rule.code.clone()) {
                return Err(ImportError::DuplicateCode {
                    row,
                    code: rule.code,
                });
            }
            rules.push(rule);
        }

        Ok(rules)
    }

    fn map_record(row: usize, record: &RawRecord) -> ImportResult<Rule> {
        let code = required(row, record, "code")?;
        let rule_type = required(row, record, "rule_type")?;
        let raw_condition = required(row, record, "condition")?;
        let content = column(record, "content").unwrap_or_default();

        let version = match column(record, "version").filter(|v| !v.is_empty()) {
            None => 1,
            Some(v) => v
                .parse::<u32>()
                .map_err(|e| ImportError::TypeConversionError {
                    row,
                    field: "version".to_string(),
                    message: format!("'{}': {}", v, e),
                })?,
        };

        let condition: Condition =
            serde_json::from_str(&raw_condition).map_err(|e| ImportError::ConditionParseError {
                row,
                code: code.clone(),
                message: e.to_string(),
            })?;
        condition
            .validate()
            .map_err(|message| ImportError::ConditionParseError {
                row,
                code: code.clone(),
                message,
            })?;

        Ok(Rule {
            code,
            rule_type,
            condition,
            content,
            version,
        })
    }

    /// 导入单个文件
    pub async fn import_file<Q: AsRef<Path>>(&self, file_path: Q) -> ImportResult<RuleBatch> {
        let path = file_path.as_ref();
        let records = self.parser.parse_to_raw_records(path)?;
        let rules = Self::map_records(&records)?;
        info!(file = %path.display(), rules = rules.len(), "规则文件解析完成");
        Ok(RuleBatch {
            source: path.to_path_buf(),
            rules,
        })
    }

    /// 批量导入多个文件（并发执行）
    pub async fn batch_import<Q: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<Q>,
    ) -> Vec<Result<RuleBatch, String>> {
        info!(count = file_paths.len(), "开始批量导入规则文件");

        let tasks = file_paths.iter().map(|path| {
            let path_str = path.as_ref().display().to_string();
            async move {
                match self.import_file(path).await {
                    Ok(batch) => Ok(batch),
                    Err(e) => {
                        error!(file = %path_str, error = %e, "规则文件导入失败");
                        Err(format!("文件 {} 导入失败: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        results
    }

    /// 导入并装载到规则库（任一文件失败则整体不装载）
    pub async fn load_into_store<Q: AsRef<Path> + Send + Sync>(
        &self,
        store: &RuleStore,
        file_paths: Vec<Q>,
        mode: LoadMode,
    ) -> ImportResult<ImportSummary> {
        let files = file_paths.len();
        let mut rules = Vec::new();
        for result in self.batch_import(file_paths).await {
            let batch = result.map_err(|e| ImportError::Other(anyhow::anyhow!(e)))?;
            rules.extend(batch.rules);
        }

        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        for rule in &rules {
            *by_type.entry(rule.rule_type.clone()).or_insert(0) += 1;
        }
        let count = rules.len();

        let corpus_version = match mode {
            LoadMode::Replace => store.reload(rules)?,
            LoadMode::Upsert => store.upsert(rules)?,
        };

        info!(corpus_version, rules = count, types = by_type.len(), ?mode, "规则库装载完成");

        Ok(ImportSummary {
            corpus_version,
            files,
            rules: count,
            by_type,
        })
    }
}

/// 按别名取列值
fn column(record: &RawRecord, canonical: &str) -> Option<String> {
    let aliases = COLUMN_ALIASES
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[]);
    aliases
        .iter()
        .find_map(|alias| record.get(*alias))
        .map(|v| v.trim().to_string())
}

fn required(row: usize, record: &RawRecord, canonical: &str) -> ImportResult<String> {
    match column(record, canonical) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ImportError::MissingField {
            row,
            field: canonical.to_string(),
        }),
    }
}
