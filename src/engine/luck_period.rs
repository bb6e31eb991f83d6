// ==========================================
// 八字排盘引擎 - 大运流年推算
// ==========================================
// 顺逆: 阳男阴女顺排, 阴男阳女逆排（终身不变）
// 起运: 顺排数至下一节, 逆排数至上一节; 三天折一年
// 大运: 自月柱起按顺逆逐步推排, 每步跨 span_years 年
// 流年: 每年干支按年柱公式独立求得
// ==========================================

use crate::config::engine_config::{CalendarConfig, LuckConfig, MAX_MAJOR_PERIOD_COUNT};
use crate::domain::chart::Chart;
use crate::domain::luck::{
    AnnualPeriod, AnnualPeriodsView, LuckPeriods, LuckStart, MajorPeriod, MajorWithAnnuals,
};
use crate::domain::pillar::Pillar;
use crate::domain::types::LuckDirection;
use crate::engine::calendar::year_pillar;
use crate::engine::solar_term::{find_solar_longitude, local_to_utc, month_start_longitude, utc_to_local};
use chrono::{Datelike, Duration};
use tracing::debug;

/// 名义年（天）: 三天折一年即 1 天折 120 天
const NOMINAL_YEAR_DAYS: i64 = 360;
const NOMINAL_MONTH_DAYS: i64 = 30;

// ==========================================
// LuckPeriodEngine - 大运流年引擎
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LuckPeriodEngine {
    calendar: CalendarConfig,
    config: LuckConfig,
}

impl LuckPeriodEngine {
    pub fn new(calendar: CalendarConfig, config: LuckConfig) -> Self {
        Self { calendar, config }
    }

    /// 大运顺逆
    pub fn direction(chart: &Chart) -> LuckDirection {
        LuckDirection::for_subject(chart.year.stem(), chart.gender())
    }

    /// 推排大运
    ///
    /// # 参数
    /// - chart: 命盘
    /// - count: 步数（None 取配置值; 不超过 MAX_MAJOR_PERIOD_COUNT）
    pub fn major_periods(&self, chart: &Chart, count: Option<u32>) -> LuckPeriods {
        let direction = Self::direction(chart);
        let start = self.luck_start(chart, direction);
        let count = count
            .unwrap_or(self.config.major_period_count)
            .min(MAX_MAJOR_PERIOD_COUNT);
        let span = self.config.span_years.max(1) as i32;

        let birth_year = chart.birth.date.year();
        let first_year = start.start_moment.year();

        let majors = (0..count)
            .map(|i| {
                let start_year = first_year + i as i32 * span;
                MajorPeriod {
                    index: i,
                    pillar: chart.month.step(direction.step() * (i as i64 + 1)),
                    start_year,
                    end_year: start_year + span - 1,
                    start_age: start_year - birth_year,
                }
            })
            .collect();

        debug!(
            direction = ?direction,
            start = %start.start_moment,
            count,
            "大运推排完成"
        );

        LuckPeriods {
            direction,
            start,
            majors,
        }
    }

    /// 起运时刻
    fn luck_start(&self, chart: &Chart, direction: LuckDirection) -> LuckStart {
        let offset = self.calendar.utc_offset_minutes;
        let birth_local = chart.birth.reference_moment();
        let birth_utc = local_to_utc(birth_local, offset);

        let (target, forward) = match direction {
            LuckDirection::Forward => (month_start_longitude(chart.solar_month + 1), true),
            LuckDirection::Backward => (month_start_longitude(chart.solar_month), false),
        };
        let term_utc = find_solar_longitude(birth_utc, target, forward);
        let elapsed_minutes = (term_utc - birth_utc).num_minutes().abs();

        let life_minutes = elapsed_minutes * self.config.life_minutes_per_minute;
        let start_moment = birth_local + Duration::minutes(life_minutes);

        let life_days = life_minutes / (24 * 60);
        let years = life_days / NOMINAL_YEAR_DAYS;
        let months = (life_days % NOMINAL_YEAR_DAYS) / NOMINAL_MONTH_DAYS;
        let days = life_days % NOMINAL_MONTH_DAYS;

        LuckStart {
            solar_term_moment: utc_to_local(term_utc, offset),
            elapsed_minutes,
            start_moment,
            years: years as u32,
            months: months as u32,
            days: days as u32,
        }
    }

    /// 某大运内的流年
    pub fn annual_periods(&self, chart: &Chart, major: &MajorPeriod) -> Vec<AnnualPeriod> {
        let birth_year = chart.birth.date.year();
        (major.start_year..=major.end_year)
            .map(|year| AnnualPeriod {
                year,
                pillar: year_pillar(year),
                age: year - birth_year,
            })
            .collect()
    }

    /// 流年视图
    ///
    /// # 参数
    /// - reference_year: 参照年; None 时返回全部大运及其流年
    /// - include_neighbors: 参照年所在大运之外, 附带前后各一步
    pub fn annual_view(
        &self,
        chart: &Chart,
        periods: &LuckPeriods,
        reference_year: Option<i32>,
        include_neighbors: bool,
    ) -> AnnualPeriodsView {
        let selected: Vec<&MajorPeriod> = match reference_year {
            None => periods.majors.iter().collect(),
            Some(year) => match periods.majors.iter().position(|m| m.contains_year(year)) {
                None => Vec::new(),
                Some(pos) => {
                    let (lo, hi) = if include_neighbors {
                        (pos.saturating_sub(1), (pos + 1).min(periods.majors.len() - 1))
                    } else {
                        (pos, pos)
                    };
                    periods.majors[lo..=hi].iter().collect()
                }
            },
        };

        AnnualPeriodsView {
            direction: periods.direction,
            reference_year,
            periods: selected
                .into_iter()
                .map(|major| MajorWithAnnuals {
                    major: major.clone(),
                    annuals: self.annual_periods(chart, major),
                })
                .collect(),
        }
    }

    /// 参照年所在大运干支
    pub fn current_major(&self, periods: &LuckPeriods, year: i32) -> Option<Pillar> {
        periods.major_for_year(year).map(|m| m.pillar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::calendar::CalendarEngine;

    fn chart(date: &str, time: &str, gender: &str) -> Chart {
        let engine = CalendarEngine::default();
        engine
            .compute_chart(&engine.parse_input(date, time, gender).unwrap())
            .unwrap()
    }

    #[test]
    fn test_forward_periods_step_from_month_pillar() {
        let c = chart("1990-05-15", "14:30", "male");
        let luck = LuckPeriodEngine::default().major_periods(&c, None);

        assert_eq!(luck.direction, LuckDirection::Forward);
        assert_eq!(luck.majors.len(), 8);
        assert_eq!(luck.majors[0].pillar.to_string(), "壬午");
        assert_eq!(luck.majors[1].pillar.to_string(), "癸未");
        assert_eq!(luck.majors[2].pillar.to_string(), "甲申");
        // 芒种 1990-06-06 约 21.7 天 → 7 岁余起运
        assert_eq!(luck.start.years, 7);
        assert_eq!(luck.start.start_moment.year(), 1997);
        assert_eq!(luck.majors[0].start_year, 1997);
        assert_eq!(luck.majors[0].end_year, 2006);
        assert_eq!(luck.majors[1].start_year, 2007);
    }

    #[test]
    fn test_backward_for_yang_year_female() {
        let c = chart("1990-05-15", "14:30", "female");
        let luck = LuckPeriodEngine::default().major_periods(&c, Some(3));

        assert_eq!(luck.direction, LuckDirection::Backward);
        assert_eq!(luck.majors.len(), 3);
        assert_eq!(luck.majors[0].pillar.to_string(), "庚辰");
        assert_eq!(luck.majors[1].pillar.to_string(), "己卯");
        assert!(luck.start.solar_term_moment < c.birth.reference_moment());
    }

    #[test]
    fn test_major_period_count_is_capped() {
        let c = chart("1990-05-15", "14:30", "male");
        let luck = LuckPeriodEngine::default().major_periods(&c, Some(u32::MAX));
        assert_eq!(luck.majors.len(), MAX_MAJOR_PERIOD_COUNT as usize);
        assert_eq!(luck.majors.last().unwrap().start_year, 1997 + 11 * 10);
    }

    #[test]
    fn test_annual_periods_use_year_formula() {
        let c = chart("1990-05-15", "14:30", "male");
        let engine = LuckPeriodEngine::default();
        let luck = engine.major_periods(&c, None);
        let annuals = engine.annual_periods(&c, &luck.majors[0]);

        assert_eq!(annuals.len(), 10);
        assert_eq!(annuals[0].year, 1997);
        assert_eq!(annuals[0].pillar.to_string(), "丁丑");
        assert_eq!(annuals[0].age, 7);
        assert_eq!(annuals[3].pillar.to_string(), "庚辰");
    }

    #[test]
    fn test_annual_view_with_neighbors() {
        let c = chart("1990-05-15", "14:30", "male");
        let engine = LuckPeriodEngine::default();
        let luck = engine.major_periods(&c, None);

        let view = engine.annual_view(&c, &luck, Some(2010), true);
        assert_eq!(view.periods.len(), 3);
        assert!(view.periods[1].major.contains_year(2010));

        let single = engine.annual_view(&c, &luck, Some(2010), false);
        assert_eq!(single.periods.len(), 1);

        let first = engine.annual_view(&c, &luck, Some(1998), true);
        assert_eq!(first.periods.len(), 2);

        let outside = engine.annual_view(&c, &luck, Some(1900), true);
        assert!(outside.periods.is_empty());
    }
}
