// ==========================================
// 八字排盘引擎 - 干支关系
// ==========================================
// 天干: 五合、相冲
// 地支: 六合、六冲、三合（半合）、六害、相刑（含自刑）
// ==========================================

use crate::domain::pillar::Pillar;
use crate::domain::types::{Branch, PillarPosition, Stem};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// 天干五合
    StemCombine,
    /// 天干相冲
    StemClash,
    /// 地支六合
    BranchHarmony,
    /// 地支六冲
    BranchClash,
    /// 地支三合（两支同局）
    BranchTriad,
    /// 地支六害
    BranchHarm,
    /// 地支相刑
    BranchPunishment,
}

impl RelationKind {
    pub const ALL: [RelationKind; 7] = [
        RelationKind::StemCombine,
        RelationKind::StemClash,
        RelationKind::BranchHarmony,
        RelationKind::BranchClash,
        RelationKind::BranchTriad,
        RelationKind::BranchHarm,
        RelationKind::BranchPunishment,
    ];

    pub fn as_cn(&self) -> &'static str {
        match self {
            RelationKind::StemCombine => "天干五合",
            RelationKind::StemClash => "天干相冲",
            RelationKind::BranchHarmony => "地支六合",
            RelationKind::BranchClash => "地支六冲",
            RelationKind::BranchTriad => "地支三合",
            RelationKind::BranchHarm => "地支六害",
            RelationKind::BranchPunishment => "地支相刑",
        }
    }

    /// 判断两柱之间是否存在该关系（对称）
    pub fn holds(self, a: Pillar, b: Pillar) -> bool {
        match self {
            RelationKind::StemCombine => stems_combine(a.stem(), b.stem()),
            RelationKind::StemClash => stems_clash(a.stem(), b.stem()),
            RelationKind::BranchHarmony => branches_harmonize(a.branch(), b.branch()),
            RelationKind::BranchClash => branches_clash(a.branch(), b.branch()),
            RelationKind::BranchTriad => branches_in_triad(a.branch(), b.branch()),
            RelationKind::BranchHarm => branches_harm(a.branch(), b.branch()),
            RelationKind::BranchPunishment => branches_punish(a.branch(), b.branch()),
        }
    }
}

/// 甲己、乙庚、丙辛、丁壬、戊癸
pub fn stems_combine(a: Stem, b: Stem) -> bool {
    (a.index() + 5) % 10 == b.index()
}

/// 甲庚、乙辛、丙壬、丁癸（戊己居中不冲）
pub fn stems_clash(a: Stem, b: Stem) -> bool {
    let (x, y) = (a.index(), b.index());
    let is_earth = |i: usize| i == 4 || i == 5;
    if is_earth(x) || is_earth(y) {
        return false;
    }
    (x + 6) % 10 == y || (y + 6) % 10 == x
}

/// 子丑、寅亥、卯戌、辰酉、巳申、午未
pub fn branches_harmonize(a: Branch, b: Branch) -> bool {
    (a.index() + b.index()) % 12 == 1
}

/// 相隔六位
pub fn branches_clash(a: Branch, b: Branch) -> bool {
    (a.index() + 6) % 12 == b.index()
}

/// 申子辰、亥卯未、寅午戌、巳酉丑 中任意两支
pub fn branches_in_triad(a: Branch, b: Branch) -> bool {
    a != b && a.index() % 4 == b.index() % 4
}

/// 子未、丑午、寅巳、卯辰、申亥、酉戌
pub fn branches_harm(a: Branch, b: Branch) -> bool {
    (a.index() + b.index()) % 12 == 7
}

/// 子卯相刑; 寅巳申无恩之刑; 丑戌未恃势之刑; 辰午酉亥自刑
pub fn branches_punish(a: Branch, b: Branch) -> bool {
    use Branch::*;
    let pair = |x: Branch, y: Branch| (a == x && b == y) || (a == y && b == x);
    if a == b {
        return matches!(a, Chen | Wu | You | Hai);
    }
    pair(Zi, Mao)
        || pair(Yin, Si)
        || pair(Si, Shen)
        || pair(Yin, Shen)
        || pair(Chou, Xu)
        || pair(Xu, Wei)
        || pair(Chou, Wei)
}

/// 命盘中两柱之间的一条关系
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarRelation {
    pub kind: RelationKind,
    pub between: [PillarPosition; 2],
    /// 如 "午未"
    pub description: String,
}
