// ==========================================
// 八字排盘引擎 - 命盘实体
// ==========================================
// 命盘由年、月、日、时四柱及各柱藏干组成
// 命盘一经排出即不可变, 只供旺衰评分/规则匹配/大运推算读取
// ==========================================

use crate::domain::pillar::Pillar;
use crate::domain::types::{Gender, PillarPosition, Stem};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// BirthInput - 出生信息
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BirthInput {
    /// 公历日期
    pub date: NaiveDate,
    /// 当地时间（None 表示时辰不详）
    pub time: Option<NaiveTime>,
    pub gender: Gender,
}

impl BirthInput {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>, gender: Gender) -> Self {
        Self { date, time, gender }
    }

    pub fn has_hour(&self) -> bool {
        self.time.is_some()
    }

    /// 用于节气边界判定的时刻（时辰不详时取正午）
    pub fn reference_moment(&self) -> NaiveDateTime {
        let time = self
            .time
            .unwrap_or_else(|| NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
        self.date.and_time(time)
    }
}

// ==========================================
// HiddenStems - 各柱地支藏干
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenStems {
    pub year: Vec<Stem>,
    pub month: Vec<Stem>,
    pub day: Vec<Stem>,
    pub hour: Option<Vec<Stem>>,
}

// ==========================================
// Chart - 命盘
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub birth: BirthInput,
    pub year: Pillar,
    pub month: Pillar,
    pub day: Pillar,
    pub hour: Option<Pillar>,
    pub hidden_stems: HiddenStems,
    /// 出生时刻太阳视黄经（度）
    pub solar_longitude: f64,
    /// 立春起算的年份
    pub solar_year: i32,
    /// 节令月序（寅月 = 0）
    pub solar_month: u32,
}

impl Chart {
    /// 组装命盘并派生藏干
    pub fn assemble(
        birth: BirthInput,
        year: Pillar,
        month: Pillar,
        day: Pillar,
        hour: Option<Pillar>,
        solar_longitude: f64,
        solar_year: i32,
        solar_month: u32,
    ) -> Self {
        let hidden_stems = HiddenStems {
            year: year.hidden_stems().to_vec(),
            month: month.hidden_stems().to_vec(),
            day: day.hidden_stems().to_vec(),
            hour: hour.map(|p| p.hidden_stems().to_vec()),
        };

        Self {
            birth,
            year,
            month,
            day,
            hour,
            hidden_stems,
            solar_longitude,
            solar_year,
            solar_month,
        }
    }

    /// 取指定柱（时柱不详时返回 None）
    pub fn pillar(&self, position: PillarPosition) -> Option<Pillar> {
        match position {
            PillarPosition::Year => Some(self.year),
            PillarPosition::Month => Some(self.month),
            PillarPosition::Day => Some(self.day),
            PillarPosition::Hour => self.hour,
        }
    }

    /// 已知的各柱（按年月日时顺序）
    pub fn known_pillars(&self) -> impl Iterator<Item = (PillarPosition, Pillar)> + '_ {
        PillarPosition::ALL
            .iter()
            .filter_map(move |pos| self.pillar(*pos).map(|p| (*pos, p)))
    }

    /// 日主
    pub fn day_master(&self) -> Stem {
        self.day.stem()
    }

    pub fn gender(&self) -> Gender {
        self.birth.gender
    }

    /// 四柱文本, 如 "庚午 辛巳 庚辰 癸未"
    pub fn display_pillars(&self) -> String {
        let hour = self
            .hour
            .map(|p| p.to_string())
            .unwrap_or_else(|| "--".to_string());
        format!("{} {} {} {}", self.year, self.month, self.day, hour)
    }
}
