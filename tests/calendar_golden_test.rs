// ==========================================
// 排盘基准测试
// ==========================================
// 测试目标: 固定出生信息 → 四柱、大运、旺衰、干支关系与已知命盘一致
// ==========================================

use bazi_engine::config::EngineConfig;
use bazi_engine::domain::{LuckDirection, PillarPosition, RelationKind, StrengthClass};
use bazi_engine::engine::{CalendarEngine, LuckPeriodEngine, RelationAnalyzer, StrengthScorer};
use bazi_engine::Chart;

fn chart(date: &str, time: &str, gender: &str) -> Chart {
    let config = EngineConfig::default();
    let calendar = CalendarEngine::new(config.calendar);
    let input = calendar.parse_input(date, time, gender).unwrap();
    calendar.compute_chart(&input).unwrap()
}

fn luck_engine() -> LuckPeriodEngine {
    let config = EngineConfig::default();
    LuckPeriodEngine::new(config.calendar, config.luck)
}

#[test]
fn test_1990_05_15_golden_chart() {
    let chart = chart("1990-05-15", "14:30", "male");
    assert_eq!(chart.display_pillars(), "庚午 辛巳 庚辰 癸未");

    let luck = luck_engine().major_periods(&chart, None);
    assert_eq!(luck.direction, LuckDirection::Forward);
    let majors: Vec<String> = luck.majors.iter().take(3).map(|m| m.pillar.to_string()).collect();
    assert_eq!(majors, vec!["壬午", "癸未", "甲申"]);
    assert_eq!(luck.start.years, 7);
    assert_eq!(luck.majors[0].start_year, 1997);

    let report = StrengthScorer::default().score(&chart);
    assert!((report.support - 5.2).abs() < 1e-9);
    assert!((report.opposition - 4.5).abs() < 1e-9);
    assert_eq!(report.class, StrengthClass::Strong);

    // 午未六合（年时）, 局中无冲
    assert_eq!(
        RelationAnalyzer::relation_between(
            &chart,
            RelationKind::BranchHarmony,
            PillarPosition::Year,
            PillarPosition::Hour
        ),
        Some(true)
    );
    assert!(!RelationAnalyzer::relation_anywhere(&chart, RelationKind::BranchClash));
}

#[test]
fn test_1984_03_08_chart_and_luck() {
    let chart = chart("1984-03-08", "09:15", "male");
    assert_eq!(chart.display_pillars(), "甲子 丁卯 辛丑 癸巳");

    let luck = luck_engine().major_periods(&chart, None);
    assert_eq!(luck.direction, LuckDirection::Forward);
    let majors: Vec<String> = luck.majors.iter().take(3).map(|m| m.pillar.to_string()).collect();
    assert_eq!(majors, vec!["戊辰", "己巳", "庚午"]);
}

#[test]
fn test_unknown_hour_uses_three_pillars() {
    let chart = chart("1984-03-08", "unknown", "male");
    assert!(chart.hour.is_none());
    assert_eq!(chart.display_pillars(), "甲子 丁卯 辛丑 --");

    let report = StrengthScorer::default().score(&chart);
    assert!((report.support - 1.05).abs() < 1e-9);
    assert!((report.opposition - 6.65).abs() < 1e-9);
    assert_eq!(report.class, StrengthClass::Weak);
}

#[test]
fn test_2000_01_01_before_lichun() {
    // 立春前仍属己卯年
    let chart = chart("2000-01-01", "12:00", "female");
    assert_eq!(chart.display_pillars(), "己卯 丙子 戊午 戊午");
}
