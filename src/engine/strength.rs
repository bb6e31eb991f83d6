// ==========================================
// 八字排盘引擎 - 日主旺衰评分
// ==========================================
// 帮身: 比劫（同我）+ 印（生我）
// 耗身: 食伤（我生）+ 财（我克）+ 官杀（克我）
// 地支按藏干分配权重, 月令最重, 日支次之
// ==========================================

use crate::config::engine_config::StrengthConfig;
use crate::domain::chart::Chart;
use crate::domain::types::{Element, ElementRelation, PillarPosition, Stem, StrengthClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 藏干权重分配（本气、中气、余气）
fn hidden_shares(count: usize) -> &'static [f64] {
    match count {
        1 => &[1.0],
        2 => &[0.7, 0.3],
        _ => &[0.6, 0.3, 0.1],
    }
}

/// 按五行关系分类的权重
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrengthBreakdown {
    pub same: f64,
    pub resource: f64,
    pub output: f64,
    pub wealth: f64,
    pub officer: f64,
}

impl StrengthBreakdown {
    fn add(&mut self, relation: ElementRelation, weight: f64) {
        match relation {
            ElementRelation::Same => self.same += weight,
            ElementRelation::Resource => self.resource += weight,
            ElementRelation::Output => self.output += weight,
            ElementRelation::Wealth => self.wealth += weight,
            ElementRelation::Officer => self.officer += weight,
        }
    }
}

/// 旺衰评分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthReport {
    pub day_master: Stem,
    pub day_master_element: Element,
    pub class: StrengthClass,
    /// 帮身 - 耗身
    pub score: f64,
    /// 帮身占比
    pub support_ratio: f64,
    pub support: f64,
    pub opposition: f64,
    pub breakdown: StrengthBreakdown,
    /// 各五行累计权重
    pub element_weights: BTreeMap<Element, f64>,
}

// ==========================================
// StrengthScorer - 旺衰评分器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct StrengthScorer {
    config: StrengthConfig,
}

impl StrengthScorer {
    pub fn new(config: StrengthConfig) -> Self {
        Self { config }
    }

    /// 计算日主旺衰（不会失败）
    pub fn score(&self, chart: &Chart) -> StrengthReport {
        let day_master = chart.day_master();
        let dm_element = day_master.element();

        let mut breakdown = StrengthBreakdown::default();
        let mut element_weights: BTreeMap<Element, f64> =
            Element::ALL.iter().map(|e| (*e, 0.0)).collect();

        let mut accumulate = |stem: Stem, weight: f64| {
            if weight <= 0.0 {
                return;
            }
            breakdown.add(stem.element().relation_to(dm_element), weight);
            *element_weights.entry(stem.element()).or_insert(0.0) += weight;
        };

        for (idx, position) in PillarPosition::ALL.iter().enumerate() {
            let Some(pillar) = chart.pillar(*position) else {
                continue;
            };

            // 日干即日主, 权重为 0
            accumulate(pillar.stem(), self.config.stem_weights[idx]);

            let hidden = pillar.hidden_stems();
            let branch_weight = self.config.branch_weights[idx];
            for (stem, share) in hidden.iter().zip(hidden_shares(hidden.len())) {
                accumulate(*stem, branch_weight * share);
            }
        }

        let support = breakdown.same + breakdown.resource;
        let opposition = breakdown.output + breakdown.wealth + breakdown.officer;
        let total = support + opposition;
        let support_ratio = if total > 0.0 { support / total } else { 0.5 };

        let class = if support_ratio >= self.config.threshold {
            StrengthClass::Strong
        } else {
            StrengthClass::Weak
        };

        StrengthReport {
            day_master,
            day_master_element: dm_element,
            class,
            score: support - opposition,
            support_ratio,
            support,
            opposition,
            breakdown,
            element_weights,
        }
    }
}
