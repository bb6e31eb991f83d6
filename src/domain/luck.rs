// ==========================================
// 八字排盘引擎 - 大运 / 流年
// ==========================================
// 大运: 十年一步, 自月柱按顺逆依次推排
// 流年: 嵌套于所在大运内, 每年干支独立按年柱公式求得
// ==========================================

use crate::domain::pillar::Pillar;
use crate::domain::types::LuckDirection;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 起运信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuckStart {
    /// 起运参照的节气时刻（当地时间）
    pub solar_term_moment: NaiveDateTime,
    /// 出生至节气的实际分钟数
    pub elapsed_minutes: i64,
    /// 起运时刻（当地时间）
    pub start_moment: NaiveDateTime,
    /// 起运岁数（年/月/日, 按三天折一年）
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

/// 一步大运
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorPeriod {
    /// 第几步（0 起）
    pub index: u32,
    pub pillar: Pillar,
    /// 起止公历年（含）
    pub start_year: i32,
    pub end_year: i32,
    /// 起运时周岁
    pub start_age: i32,
}

impl MajorPeriod {
    pub fn contains_year(&self, year: i32) -> bool {
        year >= self.start_year && year <= self.end_year
    }
}

/// 流年
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualPeriod {
    pub year: i32,
    pub pillar: Pillar,
    /// 周岁
    pub age: i32,
}

/// 大运序列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuckPeriods {
    /// 顺逆（终身不变）
    pub direction: LuckDirection,
    pub start: LuckStart,
    pub majors: Vec<MajorPeriod>,
}

impl LuckPeriods {
    /// 查找包含指定公历年的大运
    pub fn major_for_year(&self, year: i32) -> Option<&MajorPeriod> {
        self.majors.iter().find(|m| m.contains_year(year))
    }
}

/// 大运 + 其内流年
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorWithAnnuals {
    pub major: MajorPeriod,
    pub annuals: Vec<AnnualPeriod>,
}

/// 流年视图（annual-periods 模块输出）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualPeriodsView {
    pub direction: LuckDirection,
    /// 查询的参照年（None 表示全部大运）
    pub reference_year: Option<i32>,
    pub periods: Vec<MajorWithAnnuals>,
}
