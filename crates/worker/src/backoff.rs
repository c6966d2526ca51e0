use std::time::Duration;

use netpulse_core::AgentConfig;
use rand::Rng;

/// Agent轮询节奏
///
/// 领取到任务后按 `active` 间隔继续，无任务按 `idle`，满载按 `busy`，
/// 连续出错时从 `error_min` 开始指数退避直至 `error_max`。间隔叠加 ±`jitter_ratio` 抖动，
/// 满载间隔只向上抖动，不会短于配置值。
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    active: Duration,
    idle: Duration,
    busy: Duration,
    error_min: Duration,
    error_max: Duration,
    jitter_ratio: f64,
}

impl BackoffPolicy {
    pub fn new(
        active: Duration,
        idle: Duration,
        busy: Duration,
        error_min: Duration,
        error_max: Duration,
        jitter_ratio: f64,
    ) -> Self {
        Self {
            active,
            idle,
            busy,
            error_min,
            error_max: error_max.max(error_min),
            jitter_ratio: jitter_ratio.clamp(0.0, 0.5),
        }
    }

    pub fn active(&self) -> Duration {
        self.jitter(self.active)
    }

    pub fn idle(&self) -> Duration {
        self.jitter(self.idle)
    }

    pub fn busy(&self) -> Duration {
        match self.jitter_factor() {
            Some(factor) => self.busy.mul_f64(1.0 + factor.abs()).max(self.busy),
            None => self.busy,
        }
    }

    /// 第 `failures` 次连续失败后的等待时间（从1开始）
    pub fn error(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let base = self
            .error_min
            .saturating_mul(1u32 << exponent)
            .min(self.error_max);
        self.jitter(base)
    }

    fn jitter(&self, base: Duration) -> Duration {
        match self.jitter_factor() {
            Some(factor) => base.mul_f64(1.0 + factor),
            None => base,
        }
    }

    fn jitter_factor(&self) -> Option<f64> {
        (self.jitter_ratio > f64::EPSILON)
            .then(|| rand::rng().random_range(-self.jitter_ratio..=self.jitter_ratio))
    }
}

impl From<&AgentConfig> for BackoffPolicy {
    fn from(config: &AgentConfig) -> Self {
        Self::new(
            Duration::from_millis(config.active_interval_ms),
            Duration::from_millis(config.idle_interval_ms),
            Duration::from_millis(config.busy_interval_ms),
            Duration::from_millis(config.error_min_ms),
            Duration::from_millis(config.error_max_ms),
            config.jitter_ratio,
        )
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}
