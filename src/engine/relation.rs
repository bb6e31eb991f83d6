// ==========================================
// 八字排盘引擎 - 干支关系与十神分析
// ==========================================
// 扫描命盘中任意两柱的合冲刑害, 并列出各柱十神
// ==========================================

use crate::domain::chart::Chart;
use crate::domain::relation::{PillarRelation, RelationKind};
use crate::domain::types::{PillarPart, PillarPosition, Stem, TenGod};
use serde::{Deserialize, Serialize};

/// 单个十神条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenGodEntry {
    pub position: PillarPosition,
    pub part: PillarPart,
    pub stem: Stem,
    pub god: TenGod,
    /// 是否为地支中气/余气; 地支本气代表地支本身, 记为 false
    pub hidden: bool,
}

/// relations 模块输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationsReport {
    pub relations: Vec<PillarRelation>,
    pub ten_gods: Vec<TenGodEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct RelationAnalyzer;

impl RelationAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// 两柱之间是否存在某关系（任一柱不详时返回 None）
    pub fn relation_between(
        chart: &Chart,
        kind: RelationKind,
        a: PillarPosition,
        b: PillarPosition,
    ) -> Option<bool> {
        let pa = chart.pillar(a)?;
        let pb = chart.pillar(b)?;
        Some(kind.holds(pa, pb))
    }

    /// 命盘中任意两柱是否存在某关系
    pub fn relation_anywhere(chart: &Chart, kind: RelationKind) -> bool {
        let pillars: Vec<_> = chart.known_pillars().collect();
        pillars.iter().enumerate().any(|(i, (_, a))| {
            pillars[i + 1..].iter().any(|(_, b)| kind.holds(*a, *b))
        })
    }

    /// 命盘全部十神（日干除外）
    pub fn ten_gods(chart: &Chart) -> Vec<TenGodEntry> {
        let dm = chart.day_master();
        let mut entries = Vec::new();

        for (position, pillar) in chart.known_pillars() {
            if position != PillarPosition::Day {
                entries.push(TenGodEntry {
                    position,
                    part: PillarPart::Stem,
                    stem: pillar.stem(),
                    god: TenGod::of(dm, pillar.stem()),
                    hidden: false,
                });
            }
            for (i, stem) in pillar.hidden_stems().iter().enumerate() {
                entries.push(TenGodEntry {
                    position,
                    part: PillarPart::Branch,
                    stem: *stem,
                    god: TenGod::of(dm, *stem),
                    hidden: i > 0,
                });
            }
        }

        entries
    }

    pub fn analyze(&self, chart: &Chart) -> RelationsReport {
        let pillars: Vec<_> = chart.known_pillars().collect();
        let mut relations = Vec::new();

        for (i, (pos_a, a)) in pillars.iter().enumerate() {
            for (pos_b, b) in &pillars[i + 1..] {
                for kind in RelationKind::ALL {
                    if !kind.holds(*a, *b) {
                        continue;
                    }
                    let description = match kind {
                        RelationKind::StemCombine | RelationKind::StemClash => {
                            format!("{}{}", a.stem(), b.stem())
                        }
                        _ => format!("{}{}", a.branch(), b.branch()),
                    };
                    relations.push(PillarRelation {
                        kind,
                        between: [*pos_a, *pos_b],
                        description,
                    });
                }
            }
        }

        RelationsReport {
            relations,
            ten_gods: Self::ten_gods(chart),
        }
    }
}
