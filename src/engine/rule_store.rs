// ==========================================
// 八字排盘引擎 - 规则库存储（热加载）
// ==========================================
// 读: 无锁读取当前快照（ArcSwap）, 读方持有快照直到本次匹配结束
// 写: reload 构建全新规则库对象后原子替换, 从不原地修改
// 版本: 每次 reload 单调递增（进程内）
// 指纹: 规则内容的 SHA-256 前 8 字节, 与发布次序无关, 供跨进程的缓存键使用
// ==========================================

use crate::domain::rule::{CorpusStamp, Rule};
use crate::engine::error::{EngineError, EngineResult};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// ==========================================
// RuleCorpus - 不可变规则库快照
// ==========================================
#[derive(Debug)]
pub struct RuleCorpus {
    version: u64,
    fingerprint: String,
    loaded_at: DateTime<Utc>,
    /// 规则类型 → 该类型规则（按编码排序）
    by_type: BTreeMap<String, Vec<Arc<Rule>>>,
    len: usize,
}

impl RuleCorpus {
    /// 校验并建立类型索引
    ///
    /// # 校验
    /// - 规则编码唯一
    /// - 条件表达式合法
    pub fn build(rules: Vec<Rule>, version: u64) -> EngineResult<Self> {
        let mut seen = HashSet::with_capacity(rules.len());
        let mut by_type: BTreeMap<String, Vec<Arc<Rule>>> = BTreeMap::new();
        let len = rules.len();

        for rule in rules {
            if !seen.insert(rule.code.clone()) {
                return Err(EngineError::DuplicateRuleCode(rule.code));
            }
            rule.condition
                .validate()
                .map_err(|message| EngineError::InvalidCondition {
                    code: rule.code.clone(),
                    message,
                })?;
            by_type
                .entry(rule.rule_type.clone())
                .or_default()
                .push(Arc::new(rule));
        }

        for rules in by_type.values_mut() {
            rules.sort_by(|a, b| a.code.cmp(&b.code));
        }
        let fingerprint = content_fingerprint(&by_type)?;

        Ok(Self {
            version,
            fingerprint,
            loaded_at: Utc::now(),
            by_type,
            len,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn stamp(&self) -> CorpusStamp {
        CorpusStamp {
            version: self.version,
            fingerprint: self.fingerprint.clone(),
        }
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 全部规则类型（有序）
    pub fn rule_types(&self) -> Vec<String> {
        self.by_type.keys().cloned().collect()
    }

    /// 某类型的规则（按编码排序）
    pub fn rules_of_type(&self, rule_type: &str) -> &[Arc<Rule>] {
        self.by_type
            .get(rule_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_type(&self, rule_type: &str) -> bool {
        self.by_type.contains_key(rule_type)
    }

    /// 按类型、编码顺序遍历全部规则
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.by_type.values().flat_map(|v| v.iter())
    }
}

/// 内容指纹: 按编码顺序逐条摘要（同一批规则无论装载顺序如何指纹相同）
fn content_fingerprint(by_type: &BTreeMap<String, Vec<Arc<Rule>>>) -> EngineResult<String> {
    let mut ordered: Vec<&Arc<Rule>> = by_type.values().flatten().collect();
    ordered.sort_by(|a, b| a.code.cmp(&b.code));

    let mut hasher = Sha256::new();
    for rule in ordered {
        let bytes = serde_json::to_vec(&**rule).map_err(|e| EngineError::InvalidCondition {
            code: rule.code.clone(),
            message: e.to_string(),
        })?;
        hasher.update(&bytes);
        hasher.update(b"\n");
    }

    Ok(hasher
        .finalize()
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect())
}

// ==========================================
// RuleStore - 规则库存储
// ==========================================
pub struct RuleStore {
    current: ArcSwapOption<RuleCorpus>,
    next_version: AtomicU64,
    /// 串行化写方, 保证版本号与发布顺序一致
    writer: Mutex<()>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStore {
    /// 创建空规则库（尚未装载）
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            next_version: AtomicU64::new(1),
            writer: Mutex::new(()),
        }
    }

    /// 整体替换规则库, 返回新版本号
    ///
    /// 校验失败时旧规则库保持不变
    pub fn reload(&self, rules: Vec<Rule>) -> EngineResult<u64> {
        let _guard = self
            .writer
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;
        self.publish(rules)
    }

    /// 校验并发布（调用方须持有写锁）
    fn publish(&self, rules: Vec<Rule>) -> EngineResult<u64> {
        let version = self.next_version.load(Ordering::SeqCst);
        let corpus = RuleCorpus::build(rules, version).map_err(|e| {
            warn!(error = %e, "规则库装载校验失败, 保留旧版本");
            e
        })?;
        let count = corpus.len();
        let fingerprint = corpus.fingerprint().to_string();

        self.current.store(Some(Arc::new(corpus)));
        self.next_version.store(version + 1, Ordering::SeqCst);

        info!(version, rules = count, fingerprint = %fingerprint, "规则库已发布");
        Ok(version)
    }

    /// 批量新增/覆盖规则（按编码）, 发布为新版本
    pub fn upsert(&self, records: Vec<Rule>) -> EngineResult<u64> {
        let _guard = self
            .writer
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;

        let mut merged: BTreeMap<String, Rule> = match self.current.load_full() {
            Some(corpus) => corpus
                .iter()
                .map(|r| (r.code.clone(), Rule::clone(r)))
                .collect(),
            None => BTreeMap::new(),
        };

        let mut incoming = HashSet::with_capacity(records.len());
        for record in records {
            if !incoming.insert(record.code.clone()) {
                return Err(EngineError::DuplicateRuleCode(record.code));
            }
            merged.insert(record.code.clone(), record);
        }

        self.publish(merged.into_values().collect())
    }

    /// 当前版本（未装载时为 None）
    pub fn current_version(&self) -> Option<u64> {
        self.current.load().as_ref().map(|c| c.version())
    }

    /// 当前版本与内容指纹（未装载时为 None）
    pub fn current_stamp(&self) -> Option<CorpusStamp> {
        self.current.load().as_ref().map(|c| c.stamp())
    }

    /// 当前快照
    pub fn snapshot(&self) -> EngineResult<Arc<RuleCorpus>> {
        self.current.load_full().ok_or(EngineError::CorpusUnavailable)
    }

    /// 要求快照版本不低于 min_version
    pub fn snapshot_at_least(&self, min_version: u64) -> EngineResult<Arc<RuleCorpus>> {
        let corpus = self.snapshot()?;
        if corpus.version() < min_version {
            return Err(EngineError::StaleCorpus {
                required: min_version,
                current: corpus.version(),
            });
        }
        Ok(corpus)
    }
}
