// ==========================================
// 八字排盘引擎 - 引擎参数读取 Trait
// ==========================================
// 职责: 定义引擎参数读取接口（不包含实现）
// 实现者: ConfigManager（config_kv 表）、StaticConfigReader（内存固定值）
// ==========================================

use crate::config::engine_config::{
    CalendarConfig, EngineConfig, LuckConfig, OrchestratorConfig, StrengthConfig,
};
use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// EngineConfigReader Trait
// ==========================================
#[async_trait]
pub trait EngineConfigReader: Send + Sync {
    // ===== 历法 =====

    /// 出生地 UTC 偏移（分钟）
    ///
    /// # 默认值
    /// - 480（东八区）
    async fn get_utc_offset_minutes(&self) -> ConfigResult<i32>;

    /// 晚子时是否换日
    ///
    /// # 默认值
    /// - true
    async fn get_late_zi_rolls_day(&self) -> ConfigResult<bool>;

    // ===== 大运 =====

    /// 每步大运年数（默认 10）
    async fn get_luck_span_years(&self) -> ConfigResult<u32>;

    /// 推排大运步数（默认 8）
    async fn get_major_period_count(&self) -> ConfigResult<u32>;

    // ===== 旺衰 =====

    /// 身强判定阈值（默认 0.5）
    async fn get_strength_threshold(&self) -> ConfigResult<f64>;

    /// 天干/地支权重（年、月、日、时）
    async fn get_strength_weights(&self) -> ConfigResult<([f64; 4], [f64; 4])>;

    // ===== 编排 =====

    /// 单模块超时（毫秒, 默认 3000）
    async fn get_module_timeout_ms(&self) -> ConfigResult<u64>;

    /// 是否启用缓存（默认 true）
    async fn get_cache_enabled(&self) -> ConfigResult<bool>;

    /// 汇总为 EngineConfig
    async fn load_engine_config(&self) -> ConfigResult<EngineConfig> {
        let (stem_weights, branch_weights) = self.get_strength_weights().await?;

        Ok(EngineConfig {
            calendar: CalendarConfig {
                utc_offset_minutes: self.get_utc_offset_minutes().await?,
                late_zi_rolls_day: self.get_late_zi_rolls_day().await?,
            },
            luck: LuckConfig {
                span_years: self.get_luck_span_years().await?,
                major_period_count: self.get_major_period_count().await?,
                ..LuckConfig::default()
            },
            strength: StrengthConfig {
                threshold: self.get_strength_threshold().await?,
                stem_weights,
                branch_weights,
            },
            orchestrator: OrchestratorConfig {
                module_timeout_ms: self.get_module_timeout_ms().await?,
                cache_enabled: self.get_cache_enabled().await?,
            },
        })
    }
}

/// 固定参数读取器
///
/// 用于不需要持久化配置的场景（如单元测试、一次性命令行调用）
#[derive(Debug, Clone, Default)]
pub struct StaticConfigReader {
    config: EngineConfig,
}

impl StaticConfigReader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineConfigReader for StaticConfigReader {
    async fn get_utc_offset_minutes(&self) -> ConfigResult<i32> {
        Ok(self.config.calendar.utc_offset_minutes)
    }

    async fn get_late_zi_rolls_day(&self) -> ConfigResult<bool> {
        Ok(self.config.calendar.late_zi_rolls_day)
    }

    async fn get_luck_span_years(&self) -> ConfigResult<u32> {
        Ok(self.config.luck.span_years)
    }

    async fn get_major_period_count(&self) -> ConfigResult<u32> {
        Ok(self.config.luck.major_period_count)
    }

    async fn get_strength_threshold(&self) -> ConfigResult<f64> {
        Ok(self.config.strength.threshold)
    }

    async fn get_strength_weights(&self) -> ConfigResult<([f64; 4], [f64; 4])> {
        Ok((
            self.config.strength.stem_weights,
            self.config.strength.branch_weights,
        ))
    }

    async fn get_module_timeout_ms(&self) -> ConfigResult<u64> {
        Ok(self.config.orchestrator.module_timeout_ms)
    }

    async fn get_cache_enabled(&self) -> ConfigResult<bool> {
        Ok(self.config.orchestrator.cache_enabled)
    }

    async fn load_engine_config(&self) -> ConfigResult<EngineConfig> {
        Ok(self.config.clone())
    }
}
