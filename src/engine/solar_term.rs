// ==========================================
// 八字排盘引擎 - 太阳黄经与节气
// ==========================================
// 算法: 低精度太阳视黄经（Meeus 第 25 章）+ ΔT 长期抛物线近似
// 精度: 1900-2100 年间节气时刻误差在数分钟内
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// J2000.0 儒略日
const J2000: f64 = 2_451_545.0;
/// 回归年（日）
const TROPICAL_YEAR_DAYS: f64 = 365.242_2;
/// 立春黄经（寅月起点）
pub const LICHUN_LONGITUDE: f64 = 315.0;

/// Unix 纪元（1970-01-01T00:00Z）的儒略日
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// UTC 时刻 → 儒略日
pub fn julian_day(utc: NaiveDateTime) -> f64 {
    UNIX_EPOCH_JD + utc.and_utc().timestamp_millis() as f64 / 86_400_000.0
}

/// ΔT = TT - UT（秒）, Morrison & Stephenson 长期公式
fn delta_t_seconds(year: f64) -> f64 {
    let u = (year - 1820.0) / 100.0;
    -20.0 + 32.0 * u * u
}

/// 指定儒略日（UT）的太阳视黄经, 取值 [0, 360)
pub fn apparent_solar_longitude(jd_ut: f64) -> f64 {
    let year = 2000.0 + (jd_ut - J2000) / 365.25;
    let jde = jd_ut + delta_t_seconds(year) / 86_400.0;
    let t = (jde - J2000) / 36_525.0;

    let l0 = 280.466_46 + 36_000.769_83 * t + 0.000_303_2 * t * t;
    let m = (357.529_11 + 35_999.050_29 * t - 0.000_153_7 * t * t).to_radians();
    let c = (1.914_602 - 0.004_817 * t - 0.000_014 * t * t) * m.sin()
        + (0.019_993 - 0.000_101 * t) * (2.0 * m).sin()
        + 0.000_289 * (3.0 * m).sin();
    let omega = (125.04 - 1_934.136 * t).to_radians();
    let lambda = l0 + c - 0.005_69 - 0.004_78 * omega.sin();

    lambda.rem_euclid(360.0)
}

/// 将角度差规整到 (-180, 180]
fn wrap_degrees(diff: f64) -> f64 {
    let d = diff.rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// 自 start 起向前（forward）或向后搜索太阳黄经到达 target 的时刻（UTC）
pub fn find_solar_longitude(start_utc: NaiveDateTime, target: f64, forward: bool) -> NaiveDateTime {
    let jd0 = julian_day(start_utc);
    let lambda0 = apparent_solar_longitude(jd0);

    let gap = if forward {
        (target - lambda0).rem_euclid(360.0)
    } else {
        -(lambda0 - target).rem_euclid(360.0)
    };
    let mut jd = jd0 + gap * TROPICAL_YEAR_DAYS / 360.0;

    // 牛顿迭代, 日行约 0.9856 度
    for _ in 0..8 {
        let diff = wrap_degrees(target - apparent_solar_longitude(jd));
        jd += diff * TROPICAL_YEAR_DAYS / 360.0;
        if diff.abs() < 1e-7 {
            break;
        }
    }

    start_utc + Duration::milliseconds(((jd - jd0) * 86_400_000.0).round() as i64)
}

/// 节令月序: 立春起寅月 = 0, 惊蛰卯月 = 1, …, 小寒丑月 = 11
pub fn solar_month_index(longitude: f64) -> u32 {
    (((longitude - LICHUN_LONGITUDE).rem_euclid(360.0)) / 30.0).floor() as u32 % 12
}

/// 第 m 个节令月的起始黄经
pub fn month_start_longitude(month_index: u32) -> f64 {
    (LICHUN_LONGITUDE + 30.0 * month_index as f64).rem_euclid(360.0)
}

/// 当地时间与 UTC 互转
pub fn local_to_utc(local: NaiveDateTime, utc_offset_minutes: i32) -> NaiveDateTime {
    local - Duration::minutes(utc_offset_minutes as i64)
}

pub fn utc_to_local(utc: NaiveDateTime, utc_offset_minutes: i32) -> NaiveDateTime {
    utc + Duration::minutes(utc_offset_minutes as i64)
}

/// 指定年份立春时刻（当地时间）
pub fn lichun_of_year(year: i32, utc_offset_minutes: i32) -> Option<NaiveDateTime> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let utc = find_solar_longitude(local_to_utc(jan1, utc_offset_minutes), LICHUN_LONGITUDE, true);
    Some(utc_to_local(utc, utc_offset_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_julian_day_epoch() {
        assert!((julian_day(dt(2000, 1, 1, 12, 0)) - J2000).abs() < 1e-9);
        assert!((julian_day(dt(2000, 1, 2, 0, 0)) - (J2000 + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_lichun_2024_within_minutes() {
        // 公布值: 2024-02-04 16:27 (UTC+8)
        let lichun = lichun_of_year(2024, 480).unwrap();
        let published = dt(2024, 2, 4, 16, 27);
        assert!((lichun - published).num_minutes().abs() <= 15, "lichun={}", lichun);
    }

    #[test]
    fn test_mangzhong_1990_within_minutes() {
        // 公布值: 1990-06-06 06:46 (UTC+8)
        let start = local_to_utc(dt(1990, 5, 15, 14, 30), 480);
        let utc = find_solar_longitude(start, 75.0, true);
        let local = utc_to_local(utc, 480);
        assert!((local - dt(1990, 6, 6, 6, 46)).num_minutes().abs() <= 15, "local={}", local);
    }

    #[test]
    fn test_backward_search_finds_previous_term() {
        let start = local_to_utc(dt(2000, 1, 1, 12, 0), 480);
        let utc = find_solar_longitude(start, 255.0, false);
        assert!(utc < start);
        assert_eq!(utc_to_local(utc, 480).date(), NaiveDate::from_ymd_opt(1999, 12, 7).unwrap());
    }

    #[test]
    fn test_solar_month_index() {
        assert_eq!(solar_month_index(315.0), 0);
        assert_eq!(solar_month_index(344.9), 0);
        assert_eq!(solar_month_index(54.18), 3);
        assert_eq!(solar_month_index(300.0), 11);
        assert_eq!(month_start_longitude(3), 45.0);
    }
}
