// ==========================================
// 八字排盘引擎 - 干支柱
// ==========================================
// 六十甲子: 天干与地支阴阳必须一致, 120 种组合中只有 60 种合法
// 序列化格式: "甲子"
// ==========================================

use crate::domain::types::{Branch, Element, Stem};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 六十甲子周期长度
pub const SEXAGENARY_CYCLE: usize = 60;

/// 干支柱（只能通过合法组合构造）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pillar {
    stem: Stem,
    branch: Branch,
}

impl Pillar {
    /// 由天干地支构造, 阴阳不一致时返回 None
    pub fn new(stem: Stem, branch: Branch) -> Option<Pillar> {
        if stem.index() % 2 == branch.index() % 2 {
            Some(Pillar { stem, branch })
        } else {
            None
        }
    }

    /// 由六十甲子序号构造（自动取模, 支持负数）
    pub fn from_cycle_index(index: i64) -> Pillar {
        let n = index.rem_euclid(SEXAGENARY_CYCLE as i64) as usize;
        Pillar {
            stem: Stem::from_index(n % 10),
            branch: Branch::from_index(n % 12),
        }
    }

    /// 六十甲子序号（甲子 = 0）
    pub fn cycle_index(&self) -> usize {
        let s = self.stem.index();
        let b = self.branch.index();
        // 求 n ≡ s (mod 10), n ≡ b (mod 12)
        (0..SEXAGENARY_CYCLE)
            .step_by(10)
            .map(|base| base + s)
            .find(|n| n % 12 == b)
            .unwrap_or(0)
    }

    /// 在六十甲子中前进/后退 steps 步
    pub fn step(&self, steps: i64) -> Pillar {
        Pillar::from_cycle_index(self.cycle_index() as i64 + steps)
    }

    pub fn stem(&self) -> Stem {
        self.stem
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    pub fn stem_element(&self) -> Element {
        self.stem.element()
    }

    pub fn branch_element(&self) -> Element {
        self.branch.element()
    }

    pub fn hidden_stems(&self) -> &'static [Stem] {
        self.branch.hidden_stems()
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.stem, self.branch)
    }
}

impl FromStr for Pillar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.len() != 2 {
            return Err(format!("干支格式错误: {}", s));
        }
        let stem: Stem = chars[0].to_string().parse()?;
        let branch: Branch = chars[1].to_string().parse()?;
        Pillar::new(stem, branch).ok_or_else(|| format!("非六十甲子组合: {}", s))
    }
}

impl TryFrom<String> for Pillar {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pillar> for String {
    fn from(value: Pillar) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sixty_pairs_valid() {
        let valid = Stem::ALL
            .iter()
            .flat_map(|s| Branch::ALL.iter().map(move |b| (*s, *b)))
            .filter(|(s, b)| Pillar::new(*s, *b).is_some())
            .count();
        assert_eq!(valid, 60);
        assert!(Pillar::new(Stem::Jia, Branch::Chou).is_none());
    }

    #[test]
    fn test_cycle_index_round_trip_all() {
        for n in 0..60 {
            assert_eq!(Pillar::from_cycle_index(n).cycle_index(), n as usize);
        }
    }

    #[test]
    fn test_step_wraps() {
        let jia_zi = Pillar::from_cycle_index(0);
        assert_eq!(jia_zi.to_string(), "甲子");
        assert_eq!(jia_zi.step(-1).to_string(), "癸亥");
        assert_eq!(jia_zi.step(61).to_string(), "乙丑");
    }

    #[test]
    fn test_parse_and_serde() {
        let p: Pillar = "庚午".parse().unwrap();
        assert_eq!(p.stem(), Stem::Geng);
        assert_eq!(p.branch(), Branch::Wu);
        assert!("甲丑".parse::<Pillar>().is_err());

        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"庚午\"");
        let back: Pillar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
