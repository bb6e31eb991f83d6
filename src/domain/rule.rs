// ==========================================
// 八字排盘引擎 - 规则实体与条件表达式
// ==========================================
// 条件表达式为封闭的谓词树（JSON 外部标签, snake_case）
// 示例: {"all":[{"stem_at":{"position":"day","stem":"甲"}},{"strength_is":{"class":"weak"}}]}
// ==========================================

use crate::domain::pillar::Pillar;
use crate::domain::relation::RelationKind;
use crate::domain::types::{
    Branch, Element, Gender, LuckDirection, PillarPart, PillarPosition, Stem, StrengthClass,
    TenGod,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Condition - 条件谓词树
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// 全部满足（空列表为真）
    All(Vec<Condition>),
    /// 任一满足（空列表为假）
    Any(Vec<Condition>),
    Not(Box<Condition>),

    StemAt {
        position: PillarPosition,
        stem: Stem,
    },
    BranchAt {
        position: PillarPosition,
        branch: Branch,
    },
    PillarAt {
        position: PillarPosition,
        pillar: Pillar,
    },
    StemPresent {
        stem: Stem,
        #[serde(default)]
        include_hidden: bool,
    },
    BranchPresent {
        branch: Branch,
    },
    ElementAt {
        position: PillarPosition,
        element: Element,
        #[serde(default)]
        part: PillarPart,
    },
    /// 明见干支（不含藏干）中某五行的个数区间
    ElementCount {
        element: Element,
        #[serde(default)]
        min: Option<u8>,
        #[serde(default)]
        max: Option<u8>,
    },
    DayMasterElement {
        element: Element,
    },
    StrengthIs {
        class: StrengthClass,
    },
    ScoreBetween {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    TenGodAt {
        position: PillarPosition,
        god: TenGod,
        #[serde(default)]
        part: PillarPart,
    },
    /// 天干与地支本气中出现某十神; include_hidden 时另计中气、余气
    TenGodPresent {
        god: TenGod,
        #[serde(default)]
        include_hidden: bool,
    },
    Relation {
        kind: RelationKind,
        between: [PillarPosition; 2],
    },
    RelationAnywhere {
        kind: RelationKind,
    },
    LuckDirection {
        direction: LuckDirection,
    },
    /// 参照年所在大运的天干五行（未给参照年时不适用）
    CurrentMajorElement {
        element: Element,
    },
    Gender {
        gender: Gender,
    },
}

impl Condition {
    /// 装载期校验, 返回不合法原因
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Condition::All(children) | Condition::Any(children) => {
                children.iter().try_for_each(|c| c.validate())
            }
            Condition::Not(inner) => inner.validate(),
            Condition::ElementCount { min, max, .. } => match (min, max) {
                (None, None) => Err("element_count 需要 min 或 max".to_string()),
                (Some(lo), Some(hi)) if lo > hi => {
                    Err(format!("element_count 区间非法: min={} > max={}", lo, hi))
                }
                _ => Ok(()),
            },
            Condition::ScoreBetween { min, max } => match (min, max) {
                (None, None) => Err("score_between 需要 min 或 max".to_string()),
                (Some(lo), Some(hi)) if lo > hi => {
                    Err(format!("score_between 区间非法: min={} > max={}", lo, hi))
                }
                _ => Ok(()),
            },
            Condition::Relation { between, .. } if between[0] == between[1] => Err(format!(
                "relation 两端柱位相同: {}",
                between[0]
            )),
            Condition::TenGodAt {
                position: PillarPosition::Day,
                part: PillarPart::Stem,
                ..
            } => Err("日干即日主, 不取十神".to_string()),
            _ => Ok(()),
        }
    }

    /// 条件树是否引用时柱
    pub fn references_hour(&self) -> bool {
        match self {
            Condition::All(children) | Condition::Any(children) => {
                children.iter().any(|c| c.references_hour())
            }
            Condition::Not(inner) => inner.references_hour(),
            Condition::StemAt { position, .. }
            | Condition::BranchAt { position, .. }
            | Condition::PillarAt { position, .. }
            | Condition::ElementAt { position, .. }
            | Condition::TenGodAt { position, .. } => *position == PillarPosition::Hour,
            Condition::Relation { between, .. } => between.contains(&PillarPosition::Hour),
            _ => false,
        }
    }
}

// ==========================================
// Rule - 规则记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// 唯一编码
    pub code: String,
    /// 规则类型（用于分区与按类型装载）
    pub rule_type: String,
    pub condition: Condition,
    /// 文本内容
    pub content: String,
    /// 记录版本戳
    pub version: u32,
}

// ==========================================
// MatchResult - 匹配结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRule {
    pub code: String,
    pub rule_type: String,
    pub content: String,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// 条件求值为假
    ConditionFalse,
    /// 条件引用的事实不适用于本命盘
    ConditionSkipped { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedRule {
    pub code: String,
    pub rule_type: String,
    pub version: u32,
    #[serde(flatten)]
    pub reason: UnmatchedReason,
}

/// 规则库标识: 进程内版本号 + 内容指纹
///
/// 版本号每个进程从 1 起算, 跨进程比较须同时比较指纹
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorpusStamp {
    pub version: u64,
    pub fingerprint: String,
}

impl fmt::Display for CorpusStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}-{}", self.version, self.fingerprint)
    }
}

/// 规则库按类型划分为命中/未命中两部分, 每条规则恰好出现一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub corpus_version: u64,
    /// 规则库内容指纹
    pub corpus_fingerprint: String,
    /// 实际参与求值的规则类型（有序）
    pub rule_types: Vec<String>,
    /// 请求了但规则库中不存在的类型
    pub unknown_types: Vec<String>,
    pub matched: Vec<MatchedRule>,
    pub unmatched: Vec<UnmatchedRule>,
}

impl MatchResult {
    pub fn total(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }

    pub fn is_matched(&self, code: &str) -> bool {
        self.matched.iter().any(|m| m.code == code)
    }

    pub fn corpus_stamp(&self) -> CorpusStamp {
        CorpusStamp {
            version: self.corpus_version,
            fingerprint: self.corpus_fingerprint.clone(),
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.unmatched
            .iter()
            .filter(|u| matches!(u.reason, UnmatchedReason::ConditionSkipped { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_json_shape() {
        let raw = r#"{"all":[
            {"stem_at":{"position":"day","stem":"甲"}},
            {"not":{"strength_is":{"class":"strong"}}},
            {"relation":{"kind":"branch_clash","between":["year","hour"]}}
        ]}"#;
        let cond: Condition = serde_json::from_str(raw).unwrap();
        assert!(cond.validate().is_ok());
        assert!(cond.references_hour());

        match cond {
            Condition::All(children) => assert_eq!(children.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_self_relation() {
        let cond = Condition::Relation {
            kind: RelationKind::BranchClash,
            between: [PillarPosition::Day, PillarPosition::Day],
        };
        assert!(cond.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_count_bounds() {
        let cond = Condition::Any(vec![Condition::ElementCount {
            element: Element::Fire,
            min: None,
            max: None,
        }]);
        assert!(cond.validate().is_err());
    }

    #[test]
    fn test_unmatched_reason_flattened() {
        let miss = UnmatchedRule {
            code: "R1".to_string(),
            rule_type: "t".to_string(),
            version: 1,
            reason: UnmatchedReason::ConditionSkipped {
                detail: "时柱不详".to_string(),
            },
        };
        let v = serde_json::to_value(&miss).unwrap();
        assert_eq!(v["reason"], "condition_skipped");
        assert_eq!(v["detail"], "时柱不详");
    }
}
