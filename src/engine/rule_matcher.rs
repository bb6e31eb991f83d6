// ==========================================
// 八字排盘引擎 - 规则匹配器
// ==========================================
// 求值: 条件树递归求值; 纯函数, 规则之间互不影响
// all/any: 结果与子条件顺序无关, 能定结果的子条件优先于不适用的子条件
// 不适用: 条件引用了本命盘不存在的事实（如时柱不详）→ 归入未命中
// 输出: 按 规则类型 → 编码 排序, 同一快照同一命盘结果恒定
// ==========================================

use crate::domain::chart::Chart;
use crate::domain::pillar::Pillar;
use crate::domain::rule::{
    Condition, MatchResult, MatchedRule, Rule, UnmatchedReason, UnmatchedRule,
};
use crate::domain::types::{Element, PillarPart, PillarPosition, TenGod};
use crate::engine::error::EngineResult;
use crate::engine::luck_period::LuckPeriodEngine;
use crate::engine::relation::RelationAnalyzer;
use crate::engine::rule_store::{RuleCorpus, RuleStore};
use crate::engine::strength::StrengthReport;
use std::collections::BTreeSet;
use tracing::debug;

// ==========================================
// ChartFacts - 求值所需事实
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ChartFacts<'a> {
    pub chart: &'a Chart,
    pub strength: &'a StrengthReport,
    /// 参照年所在大运（未给参照年时为 None）
    pub current_major: Option<Pillar>,
}

impl<'a> ChartFacts<'a> {
    pub fn new(chart: &'a Chart, strength: &'a StrengthReport) -> Self {
        Self {
            chart,
            strength,
            current_major: None,
        }
    }

    pub fn with_current_major(mut self, major: Option<Pillar>) -> Self {
        self.current_major = major;
        self
    }

    fn pillar(&self, position: PillarPosition) -> Result<Pillar, ConditionSkipped> {
        self.chart
            .pillar(position)
            .ok_or_else(|| ConditionSkipped::new(format!("{}柱不详", position.as_cn())))
    }
}

/// 条件不适用于本命盘
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSkipped {
    pub detail: String,
}

impl ConditionSkipped {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// 条件求值
///
/// # 返回
/// - Ok(true/false): 条件成立与否
/// - Err(ConditionSkipped): 条件不适用
///
/// # 说明
/// - all: 任一子条件为假即为假; 否则有不适用则不适用
/// - any: 任一子条件为真即为真; 否则有不适用则不适用
/// - not: 不适用原样传递
pub fn evaluate(condition: &Condition, facts: &ChartFacts) -> Result<bool, ConditionSkipped> {
    let chart = facts.chart;

    match condition {
        Condition::All(children) => settle(children, facts, false),
        Condition::Any(children) => settle(children, facts, true),
        Condition::Not(inner) => Ok(!evaluate(inner, facts)?),

        Condition::StemAt { position, stem } => Ok(facts.pillar(*position)?.stem() == *stem),
        Condition::BranchAt { position, branch } => {
            Ok(facts.pillar(*position)?.branch() == *branch)
        }
        Condition::PillarAt { position, pillar } => Ok(facts.pillar(*position)? == *pillar),

        Condition::StemPresent {
            stem,
            include_hidden,
        } => Ok(chart.known_pillars().any(|(_, p)| {
            p.stem() == *stem || (*include_hidden && p.hidden_stems().contains(stem))
        })),
        Condition::BranchPresent { branch } => {
            Ok(chart.known_pillars().any(|(_, p)| p.branch() == *branch))
        }

        Condition::ElementAt {
            position,
            element,
            part,
        } => {
            let p = facts.pillar(*position)?;
            Ok(match part {
                PillarPart::Stem => p.stem_element() == *element,
                PillarPart::Branch => p.branch_element() == *element,
                PillarPart::Either => {
                    p.stem_element() == *element || p.branch_element() == *element
                }
            })
        }
        Condition::ElementCount { element, min, max } => {
            let count = visible_element_count(chart, *element);
            Ok(min.map_or(true, |lo| count >= lo as usize)
                && max.map_or(true, |hi| count <= hi as usize))
        }
        Condition::DayMasterElement { element } => {
            Ok(chart.day_master().element() == *element)
        }

        Condition::StrengthIs { class } => Ok(facts.strength.class == *class),
        Condition::ScoreBetween { min, max } => {
            let score = facts.strength.score;
            Ok(min.map_or(true, |lo| score >= lo) && max.map_or(true, |hi| score <= hi))
        }

        Condition::TenGodAt {
            position,
            god,
            part,
        } => {
            let p = facts.pillar(*position)?;
            let dm = chart.day_master();
            let on_stem = *position != PillarPosition::Day && TenGod::of(dm, p.stem()) == *god;
            let on_branch = TenGod::of(dm, p.branch().main_stem()) == *god;
            Ok(match part {
                PillarPart::Stem => on_stem,
                PillarPart::Branch => on_branch,
                PillarPart::Either => on_stem || on_branch,
            })
        }
        Condition::TenGodPresent {
            god,
            include_hidden,
        } => Ok(RelationAnalyzer::ten_gods(chart)
            .iter()
            .any(|entry| entry.god == *god && (*include_hidden || !entry.hidden))),

        Condition::Relation { kind, between } => {
            let a = facts.pillar(between[0])?;
            let b = facts.pillar(between[1])?;
            Ok(kind.holds(a, b))
        }
        Condition::RelationAnywhere { kind } => {
            Ok(RelationAnalyzer::relation_anywhere(chart, *kind))
        }

        Condition::LuckDirection { direction } => {
            Ok(LuckPeriodEngine::direction(chart) == *direction)
        }
        Condition::CurrentMajorElement { element } => match facts.current_major {
            Some(major) => Ok(major.stem_element() == *element),
            None => Err(ConditionSkipped::new("未给参照年, 无当前大运")),
        },
        Condition::Gender { gender } => Ok(chart.gender() == *gender),
    }
}

/// 已知各柱明见干支中某五行的个数
fn visible_element_count(chart: &Chart, element: Element) -> usize {
    chart
        .known_pillars()
        .map(|(_, p)| {
            (p.stem_element() == element) as usize + (p.branch_element() == element) as usize
        })
        .sum()
}

/// all / any 的公共求值: 遇到 decisive 即返回, 不适用只在没有子条件能定结果时上报
fn settle(
    children: &[Condition],
    facts: &ChartFacts,
    decisive: bool,
) -> Result<bool, ConditionSkipped> {
    let mut skipped = None;
    for child in children {
        match evaluate(child, facts) {
            Ok(v) if v == decisive => return Ok(decisive),
            Ok(_) => {}
            Err(e) => {
                skipped.get_or_insert(e);
            }
        }
    }
    match skipped {
        Some(e) => Err(e),
        None => Ok(!decisive),
    }
}

// ==========================================
// RuleMatcher - 规则匹配器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher;

impl RuleMatcher {
    pub fn new() -> Self {
        Self
    }

    /// 对指定快照求值
    ///
    /// # 参数
    /// - corpus: 规则库快照（整个求值过程只读这一份）
    /// - facts: 命盘事实
    /// - rule_types: 请求的规则类型; 为空表示全部类型
    pub fn match_all(
        &self,
        corpus: &RuleCorpus,
        facts: &ChartFacts,
        rule_types: &[String],
    ) -> MatchResult {
        let requested: BTreeSet<String> = if rule_types.is_empty() {
            corpus.rule_types().into_iter().collect()
        } else {
            rule_types.iter().map(|t| t.trim().to_string()).collect()
        };

        let (known, unknown): (Vec<String>, Vec<String>) =
            requested.into_iter().partition(|t| corpus.has_type(t));

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();

        for rule_type in &known {
            for rule in corpus.rules_of_type(rule_type) {
                match evaluate(&rule.condition, facts) {
                    Ok(true) => matched.push(matched_entry(rule)),
                    Ok(false) => unmatched.push(unmatched_entry(rule, UnmatchedReason::ConditionFalse)),
                    Err(skipped) => unmatched.push(unmatched_entry(
                        rule,
                        UnmatchedReason::ConditionSkipped {
                            detail: skipped.detail,
                        },
                    )),
                }
            }
        }

        debug!(
            corpus_version = corpus.version(),
            types = known.len(),
            matched = matched.len(),
            unmatched = unmatched.len(),
            "规则匹配完成"
        );

        MatchResult {
            corpus_version: corpus.version(),
            corpus_fingerprint: corpus.fingerprint().to_string(),
            rule_types: known,
            unknown_types: unknown,
            matched,
            unmatched,
        }
    }

    /// 取最新快照求值（CorpusUnavailable / StaleCorpus 时失败）
    pub fn match_latest(
        &self,
        store: &RuleStore,
        facts: &ChartFacts,
        rule_types: &[String],
        min_corpus_version: Option<u64>,
    ) -> EngineResult<MatchResult> {
        let corpus = match min_corpus_version {
            Some(v) => store.snapshot_at_least(v)?,
            None => store.snapshot()?,
        };
        Ok(self.match_all(&corpus, facts, rule_types))
    }
}

fn matched_entry(rule: &Rule) -> MatchedRule {
    MatchedRule {
        code: rule.code.clone(),
        rule_type: rule.rule_type.clone(),
        content: rule.content.clone(),
        version: rule.version,
    }
}

fn unmatched_entry(rule: &Rule, reason: UnmatchedReason) -> UnmatchedRule {
    UnmatchedRule {
        code: rule.code.clone(),
        rule_type: rule.rule_type.clone(),
        version: rule.version,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::relation::RelationKind;
    use crate::domain::types::{Branch, Gender, LuckDirection, Stem, StrengthClass};
    use crate::engine::calendar::CalendarEngine;
    use crate::engine::error::EngineError;
    use crate::engine::strength::StrengthScorer;

    fn chart(time: &str) -> Chart {
        let engine = CalendarEngine::default();
        engine
            .compute_chart(&engine.parse_input("1984-03-08", time, "male").unwrap())
            .unwrap()
    }

    fn rule(code: &str, rule_type: &str, condition: Condition) -> Rule {
        Rule {
            code: code.to_string(),
            rule_type: rule_type.to_string(),
            condition,
            content: format!("{} 内容", code),
            version: 1,
        }
    }

    #[test]
    fn test_leaf_predicates_on_jia_zi_chart() {
        // 甲子 丁卯 辛丑 癸巳
        let c = chart("09:15");
        let s = StrengthScorer::default().score(&c);
        let facts = ChartFacts::new(&c, &s);

        let yes = [
            Condition::StemAt {
                position: PillarPosition::Year,
                stem: Stem::Jia,
            },
            Condition::BranchAt {
                position: PillarPosition::Hour,
                branch: Branch::Si,
            },
            Condition::DayMasterElement {
                element: Element::Metal,
            },
            Condition::Relation {
                kind: RelationKind::BranchHarmony,
                between: [PillarPosition::Year, PillarPosition::Day],
            },
            Condition::TenGodAt {
                position: PillarPosition::Month,
                god: TenGod::SevenKillings,
                part: PillarPart::Stem,
            },
            Condition::LuckDirection {
                direction: LuckDirection::Forward,
            },
            Condition::Gender {
                gender: Gender::Male,
            },
            Condition::StemPresent {
                stem: Stem::Ji,
                include_hidden: true,
            },
        ];
        for cond in &yes {
            assert_eq!(evaluate(cond, &facts), Ok(true), "{:?}", cond);
        }

        assert_eq!(
            evaluate(
                &Condition::StemPresent {
                    stem: Stem::Ji,
                    include_hidden: false
                },
                &facts
            ),
            Ok(false)
        );
    }

    #[test]
    fn test_combinators_independent_of_child_order() {
        let c = chart("unknown");
        let s = StrengthScorer::default().score(&c);
        let facts = ChartFacts::new(&c, &s);

        let hour_ref = Condition::StemAt {
            position: PillarPosition::Hour,
            stem: Stem::Gui,
        };
        let falsy = Condition::Gender {
            gender: Gender::Female,
        };
        let truthy = Condition::Gender {
            gender: Gender::Male,
        };

        // 能定结果的子条件优先, 与顺序无关
        for children in [
            vec![falsy.clone(), hour_ref.clone()],
            vec![hour_ref.clone(), falsy.clone()],
        ] {
            assert_eq!(evaluate(&Condition::All(children), &facts), Ok(false));
        }
        for children in [
            vec![truthy.clone(), hour_ref.clone()],
            vec![hour_ref.clone(), truthy.clone()],
        ] {
            assert_eq!(evaluate(&Condition::Any(children), &facts), Ok(true));
        }

        // 无法定结果时才算不适用
        assert_eq!(
            evaluate(&Condition::All(vec![hour_ref.clone(), truthy.clone()]), &facts),
            Err(ConditionSkipped::new("时柱不详"))
        );
        assert_eq!(
            evaluate(&Condition::Any(vec![falsy.clone(), hour_ref.clone()]), &facts),
            Err(ConditionSkipped::new("时柱不详"))
        );
        assert!(evaluate(&Condition::Not(Box::new(hour_ref.clone())), &facts).is_err());
        assert_eq!(evaluate(&Condition::All(vec![]), &facts), Ok(true));
        assert_eq!(evaluate(&Condition::Any(vec![]), &facts), Ok(false));
    }

    #[test]
    fn test_current_major_requires_reference_year() {
        let c = chart("09:15");
        let s = StrengthScorer::default().score(&c);
        let cond = Condition::CurrentMajorElement {
            element: Element::Earth,
        };

        assert!(evaluate(&cond, &ChartFacts::new(&c, &s)).is_err());

        let luck = LuckPeriodEngine::default().major_periods(&c, None);
        // 首步大运 戊辰
        let facts = ChartFacts::new(&c, &s).with_current_major(Some(luck.majors[0].pillar));
        assert_eq!(evaluate(&cond, &facts), Ok(true));
    }

    #[test]
    fn test_match_all_partitions_and_orders() {
        let store = RuleStore::new();
        store
            .reload(vec![
                rule(
                    "B-002",
                    "b",
                    Condition::StrengthIs {
                        class: StrengthClass::Strong,
                    },
                ),
                rule(
                    "B-001",
                    "b",
                    Condition::StrengthIs {
                        class: StrengthClass::Weak,
                    },
                ),
                rule(
                    "A-001",
                    "a",
                    Condition::BranchAt {
                        position: PillarPosition::Hour,
                        branch: Branch::Si,
                    },
                ),
                rule(
                    "C-001",
                    "c",
                    Condition::Gender {
                        gender: Gender::Male,
                    },
                ),
            ])
            .unwrap();

        let c = chart("unknown");
        let s = StrengthScorer::default().score(&c);
        let facts = ChartFacts::new(&c, &s);
        let matcher = RuleMatcher::new();

        let all = matcher.match_latest(&store, &facts, &[], None).unwrap();
        assert_eq!(all.total(), 4);
        assert_eq!(all.rule_types, vec!["a", "b", "c"]);
        assert_eq!(all.skipped_count(), 1);
        let unmatched: Vec<_> = all.unmatched.iter().map(|u| u.code.as_str()).collect();
        // 辛金生卯月, 身弱
        assert_eq!(unmatched, vec!["A-001", "B-002"]);
        assert!(all.matched.windows(2).all(|w| (&w[0].rule_type, &w[0].code)
            < (&w[1].rule_type, &w[1].code)));

        let subset = matcher
            .match_latest(&store, &facts, &["b".to_string(), "zzz".to_string()], None)
            .unwrap();
        assert_eq!(subset.total(), 2);
        assert_eq!(subset.unknown_types, vec!["zzz"]);

        let again = matcher.match_latest(&store, &facts, &[], None).unwrap();
        assert_eq!(all, again);
    }

    #[test]
    fn test_match_latest_without_corpus() {
        let store = RuleStore::new();
        let c = chart("09:15");
        let s = StrengthScorer::default().score(&c);
        let result = RuleMatcher::new().match_latest(&store, &ChartFacts::new(&c, &s), &[], None);
        assert_eq!(result, Err(EngineError::CorpusUnavailable));
    }
}
