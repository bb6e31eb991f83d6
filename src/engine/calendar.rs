// ==========================================
// 八字排盘引擎 - 历法引擎（排四柱）
// ==========================================
// 年柱: 立春换年, (年 - 4) mod 60
// 月柱: 节令换月, 五虎遁定月干
// 日柱: 1900-01-01 为甲戌, 逐日累加; 晚子时可归次日
// 时柱: 两小时一辰, 五鼠遁定时干
// ==========================================

use crate::config::engine_config::{CalendarConfig, MAX_SUPPORTED_YEAR, MIN_SUPPORTED_YEAR};
use crate::domain::chart::{BirthInput, Chart};
use crate::domain::pillar::Pillar;
use crate::domain::types::{Branch, Gender, Stem};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::solar_term::{apparent_solar_longitude, julian_day, local_to_utc, solar_month_index};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use tracing::debug;

/// 日柱纪元: 1900-01-01 = 甲戌（六十甲子序号 10）
const DAY_EPOCH_INDEX: i64 = 10;

/// 时辰不详的输入写法
const UNKNOWN_TIME_MARKERS: [&str; 4] = ["", "-", "unknown", "未知"];

// ==========================================
// CalendarEngine - 历法引擎
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CalendarEngine {
    config: CalendarConfig,
}

impl CalendarEngine {
    pub fn new(config: CalendarConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// 解析出生信息
    ///
    /// # 参数
    /// - date: "YYYY-MM-DD"
    /// - time: "HH:MM" / "HH:MM:SS", 空串/"-"/"unknown" 表示时辰不详
    /// - gender: "male" / "female"（兼容 男/女）
    pub fn parse_input(&self, date: &str, time: &str, gender: &str) -> EngineResult<BirthInput> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|e| EngineError::InvalidInput(format!("日期无法解析 '{}': {}", date, e)))?;

        let time = time.trim();
        let time = if UNKNOWN_TIME_MARKERS.iter().any(|m| m.eq_ignore_ascii_case(time)) {
            None
        } else {
            let parsed = NaiveTime::parse_from_str(time, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
                .map_err(|e| EngineError::InvalidInput(format!("时间无法解析 '{}': {}", time, e)))?;
            Some(parsed)
        };

        let gender: Gender = gender.parse().map_err(EngineError::InvalidInput)?;

        let input = BirthInput::new(date, time, gender);
        self.validate_range(&input)?;
        Ok(input)
    }

    fn validate_range(&self, input: &BirthInput) -> EngineResult<()> {
        let year = input.date.year();
        if !(MIN_SUPPORTED_YEAR..=MAX_SUPPORTED_YEAR).contains(&year) {
            return Err(EngineError::InvalidInput(format!(
                "日期 {} 超出支持范围 [{}, {}]",
                input.date, MIN_SUPPORTED_YEAR, MAX_SUPPORTED_YEAR
            )));
        }
        Ok(())
    }

    /// 排四柱
    pub fn compute_chart(&self, input: &BirthInput) -> EngineResult<Chart> {
        self.validate_range(input)?;

        // 节气边界以当地时刻判定
        let local = input.reference_moment();
        let utc = local_to_utc(local, self.config.utc_offset_minutes);
        let longitude = apparent_solar_longitude(julian_day(utc));
        let solar_month = solar_month_index(longitude);

        // 1、2 月处于子/丑月时尚未立春, 归上一年
        let civil_year = input.date.year();
        let solar_year = if input.date.month() <= 2 && solar_month >= 10 {
            civil_year - 1
        } else {
            civil_year
        };

        let year = year_pillar(solar_year);
        let month = month_pillar(year.stem(), solar_month);
        let day_date = self.effective_day(input);
        let day = day_pillar(day_date);
        let hour = input
            .time
            .map(|t| hour_pillar(day.stem(), hour_branch(t.hour())));

        debug!(
            date = %input.date,
            longitude,
            solar_year,
            solar_month,
            "四柱推算完成"
        );

        Ok(Chart::assemble(
            *input,
            year,
            month,
            day,
            hour,
            longitude,
            solar_year,
            solar_month,
        ))
    }

    /// 日柱所依的日期（晚子时换日）
    fn effective_day(&self, input: &BirthInput) -> NaiveDate {
        match input.time {
            Some(t) if self.config.late_zi_rolls_day && t.hour() == 23 => {
                input.date + Duration::days(1)
            }
            _ => input.date,
        }
    }
}

/// 年柱: 以立春年计
pub fn year_pillar(solar_year: i32) -> Pillar {
    Pillar::from_cycle_index(solar_year as i64 - 4)
}

/// 月柱: 五虎遁（甲己之年丙作首）
pub fn month_pillar(year_stem: Stem, solar_month: u32) -> Pillar {
    let first_stem = (year_stem.index() % 5) * 2 + 2;
    let stem = Stem::from_index(first_stem + solar_month as usize);
    let branch = Branch::from_index(solar_month as usize + 2);
    pillar_of(stem, branch)
}

/// 日柱
pub fn day_pillar(date: NaiveDate) -> Pillar {
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(date);
    let days = (date - epoch).num_days();
    Pillar::from_cycle_index(DAY_EPOCH_INDEX + days)
}

/// 时支: 23-1 点子时, 1-3 点丑时, …
pub fn hour_branch(hour: u32) -> Branch {
    Branch::from_index(((hour as usize + 1) / 2) % 12)
}

/// 时柱: 五鼠遁（甲己还加甲）
pub fn hour_pillar(day_stem: Stem, branch: Branch) -> Pillar {
    let first_stem = (day_stem.index() % 5) * 2;
    let stem = Stem::from_index(first_stem + branch.index());
    pillar_of(stem, branch)
}

/// 遁干公式保证阴阳一致
fn pillar_of(stem: Stem, branch: Branch) -> Pillar {
    Pillar::new(stem, branch)
        .unwrap_or_else(|| Pillar::from_cycle_index(branch.index() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CalendarEngine {
        CalendarEngine::new(CalendarConfig::default())
    }

    #[test]
    fn test_day_pillar_known_dates() {
        assert_eq!(day_pillar(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap()).to_string(), "甲戌");
        assert_eq!(day_pillar(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).to_string(), "戊午");
        assert_eq!(day_pillar(NaiveDate::from_ymd_opt(1990, 5, 15).unwrap()).to_string(), "庚辰");
    }

    #[test]
    fn test_year_pillar() {
        assert_eq!(year_pillar(1984).to_string(), "甲子");
        assert_eq!(year_pillar(1990).to_string(), "庚午");
        assert_eq!(year_pillar(2024).to_string(), "甲辰");
    }

    #[test]
    fn test_month_pillar_five_tigers() {
        assert_eq!(month_pillar(Stem::Jia, 0).to_string(), "丙寅");
        assert_eq!(month_pillar(Stem::Geng, 3).to_string(), "辛巳");
        assert_eq!(month_pillar(Stem::Wu, 11).to_string(), "乙丑");
    }

    #[test]
    fn test_hour_pillar_five_rats() {
        assert_eq!(hour_branch(23), Branch::Zi);
        assert_eq!(hour_branch(0), Branch::Zi);
        assert_eq!(hour_branch(14), Branch::Wei);
        assert_eq!(hour_pillar(Stem::Geng, Branch::Wei).to_string(), "癸未");
        assert_eq!(hour_pillar(Stem::Jia, Branch::Zi).to_string(), "甲子");
    }

    #[test]
    fn test_parse_input_rejects_bad_values() {
        let e = engine();
        assert!(matches!(
            e.parse_input("1990-13-01", "10:00", "male"),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            e.parse_input("1990-05-15", "25:00", "male"),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            e.parse_input("1850-05-15", "10:00", "male"),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            e.parse_input("1990-05-15", "10:00", "other"),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unknown_hour_has_no_hour_pillar() {
        let e = engine();
        let input = e.parse_input("1990-05-15", "unknown", "female").unwrap();
        let chart = e.compute_chart(&input).unwrap();
        assert!(chart.hour.is_none());
        assert!(chart.hidden_stems.hour.is_none());
        assert_eq!(chart.day.to_string(), "庚辰");
    }

    #[test]
    fn test_late_zi_rolls_day_forward() {
        let e = engine();
        let before = e
            .compute_chart(&e.parse_input("1990-05-15", "22:59", "male").unwrap())
            .unwrap();
        let late = e
            .compute_chart(&e.parse_input("1990-05-15", "23:10", "male").unwrap())
            .unwrap();
        assert_eq!(before.day.to_string(), "庚辰");
        assert_eq!(late.day.to_string(), "辛巳");
        assert_eq!(late.hour.unwrap().branch(), Branch::Zi);
        // 辛日子时起戊子
        assert_eq!(late.hour.unwrap().to_string(), "戊子");

        let no_roll = CalendarEngine::new(CalendarConfig {
            late_zi_rolls_day: false,
            ..CalendarConfig::default()
        });
        let kept = no_roll
            .compute_chart(&no_roll.parse_input("1990-05-15", "23:10", "male").unwrap())
            .unwrap();
        assert_eq!(kept.day.to_string(), "庚辰");
    }

    #[test]
    fn test_before_lichun_belongs_to_previous_year() {
        let e = engine();
        let chart = e
            .compute_chart(&e.parse_input("2000-01-01", "12:00", "male").unwrap())
            .unwrap();
        assert_eq!(chart.solar_year, 1999);
        assert_eq!(chart.year.to_string(), "己卯");
        assert_eq!(chart.month.to_string(), "丙子");
        assert_eq!(chart.day.to_string(), "戊午");
    }
}
