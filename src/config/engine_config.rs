// ==========================================
// 八字排盘引擎 - 引擎参数
// ==========================================
// 历法、大运、旺衰、编排各部分的可调参数及默认值
// 覆写来源: config_kv 表（见 ConfigManager）
// ==========================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 支持的公历年份范围（含）
pub const MIN_SUPPORTED_YEAR: i32 = 1900;
pub const MAX_SUPPORTED_YEAR: i32 = 2100;

/// 大运步数上限（请求参数与配置覆写共用）
pub const MAX_MAJOR_PERIOD_COUNT: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// 出生地时间相对 UTC 的偏移（分钟, 默认东八区）
    pub utc_offset_minutes: i32,
    /// 23 点后是否换日（晚子时归次日）
    pub late_zi_rolls_day: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 480,
            late_zi_rolls_day: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckConfig {
    /// 每步大运跨越年数
    pub span_years: u32,
    /// 推排大运步数
    pub major_period_count: u32,
    /// 实际一分钟折合的人生分钟数（三天折一年 = 120）
    pub life_minutes_per_minute: i64,
}

impl Default for LuckConfig {
    fn default() -> Self {
        Self {
            span_years: 10,
            major_period_count: 8,
            life_minutes_per_minute: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthConfig {
    /// 帮身占比阈值（>= 阈值判为身强）
    pub threshold: f64,
    /// 天干权重（年、月、日、时）, 日干即日主本身不计
    pub stem_weights: [f64; 4],
    /// 地支权重（年、月、日、时）, 月令最重
    pub branch_weights: [f64; 4],
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            stem_weights: [1.0, 1.2, 0.0, 1.0],
            branch_weights: [1.0, 3.0, 1.5, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// 单模块计算超时（毫秒）
    pub module_timeout_ms: u64,
    /// 是否启用结果缓存
    pub cache_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            module_timeout_ms: 3_000,
            cache_enabled: true,
        }
    }
}

/// 引擎参数全集
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub calendar: CalendarConfig,
    pub luck: LuckConfig,
    pub strength: StrengthConfig,
    pub orchestrator: OrchestratorConfig,
}

impl EngineConfig {
    /// 影响计算结果的参数指纹（历法、大运、旺衰; 编排参数不影响结果, 不计入）
    ///
    /// 用于缓存键: 参数变化后旧缓存条目自然失效
    pub fn fingerprint(&self) -> u64 {
        let bytes = serde_json::to_vec(&(&self.calendar, &self.luck, &self.strength))
            .unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_follows_result_affecting_params() {
        let base = EngineConfig::default();
        assert_eq!(base.fingerprint(), EngineConfig::default().fingerprint());

        let mut threshold = base.clone();
        threshold.strength.threshold = 0.6;
        assert_ne!(threshold.fingerprint(), base.fingerprint());

        let mut luck = base.clone();
        luck.luck.major_period_count = 3;
        assert_ne!(luck.fingerprint(), base.fingerprint());

        let mut orchestration = base.clone();
        orchestration.orchestrator.module_timeout_ms = 50;
        orchestration.orchestrator.cache_enabled = false;
        assert_eq!(orchestration.fingerprint(), base.fingerprint());
    }
}
