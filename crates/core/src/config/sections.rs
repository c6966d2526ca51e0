use std::collections::BTreeMap;
use std::time::Duration;

use netpulse_errors::{NetpulseError, NetpulseResult};
use serde::{Deserialize, Serialize};

use super::validation::{ConfigValidator, ValidationUtils};
use crate::models::Capability;

/// 注册表后端
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistryBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
    pub redis_url: String,
    /// 任务记录过期时间，0表示不过期
    pub task_ttl_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            task_ttl_seconds: 86_400,
        }
    }
}

impl RegistryConfig {
    pub fn task_ttl(&self) -> Option<Duration> {
        (self.task_ttl_seconds > 0).then(|| Duration::from_secs(self.task_ttl_seconds))
    }
}

impl ConfigValidator for RegistryConfig {
    fn validate(&self) -> NetpulseResult<()> {
        if self.backend == RegistryBackend::Redis {
            ValidationUtils::validate_url(&self.redis_url, "registry.redis_url")?;
        }
        Ok(())
    }
}

/// 单个区域的接入信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionConfig {
    pub hub_url: String,
    /// 协调器与该区域节点共享的密钥
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub bind_address: String,
    pub admin_username: String,
    pub admin_password: String,
    pub regions: BTreeMap<String, RegionConfig>,
    pub request_timeout_seconds: u64,
    pub token_ttl_seconds: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let mut regions = BTreeMap::new();
        regions.insert(
            "ru".to_string(),
            RegionConfig {
                hub_url: "http://127.0.0.1:8001".to_string(),
                secret: "change-this-region-secret".to_string(),
            },
        );
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "change-this-admin-password".to_string(),
            regions,
            request_timeout_seconds: 5,
            token_ttl_seconds: 60,
        }
    }
}

impl CoordinatorConfig {
    pub fn region_names(&self) -> Vec<String> {
        self.regions.keys().cloned().collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl ConfigValidator for CoordinatorConfig {
    fn validate(&self) -> NetpulseResult<()> {
        ValidationUtils::validate_bind_address(&self.bind_address, "coordinator.bind_address")?;
        ValidationUtils::validate_not_empty(&self.admin_username, "coordinator.admin_username")?;
        ValidationUtils::validate_not_empty(&self.admin_password, "coordinator.admin_password")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "coordinator.request_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.token_ttl_seconds,
            "coordinator.token_ttl_seconds",
        )?;

        if self.regions.is_empty() {
            return Err(NetpulseError::config_error(
                "coordinator.regions 至少需要配置一个区域",
            ));
        }
        for (name, region) in &self.regions {
            ValidationUtils::validate_not_empty(name, "coordinator.regions")?;
            if name.eq_ignore_ascii_case("auto") {
                return Err(NetpulseError::config_error(
                    "区域名 auto 为保留字，用于随机选择区域",
                ));
            }
            ValidationUtils::validate_url(
                &region.hub_url,
                &format!("coordinator.regions.{name}.hub_url"),
            )?;
            ValidationUtils::validate_not_empty(
                &region.secret,
                &format!("coordinator.regions.{name}.secret"),
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    pub hub_id: String,
    pub region: String,
    pub bind_address: String,
    /// 与协调器共享的区域密钥
    pub secret: String,
    /// 为空时不向协调器上报结果
    pub coordinator_url: Option<String>,
    pub default_capabilities: Vec<String>,
    pub default_max_tasks: u32,
    /// 参与Agent凭证派生的本层密钥
    pub agent_token_secret: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_id: "hub-ru-1".to_string(),
            region: "ru".to_string(),
            bind_address: "0.0.0.0:8001".to_string(),
            secret: "change-this-region-secret".to_string(),
            coordinator_url: Some("http://127.0.0.1:8000".to_string()),
            default_capabilities: vec![
                "http".to_string(),
                "https".to_string(),
                "ping".to_string(),
                "tcp".to_string(),
                "traceroute".to_string(),
                "dns".to_string(),
            ],
            default_max_tasks: 5,
            agent_token_secret: "change-this-agent-secret".to_string(),
        }
    }
}

impl HubConfig {
    pub fn default_capability_set(&self) -> NetpulseResult<Vec<Capability>> {
        Capability::parse_list(&self.default_capabilities)
    }
}

impl ConfigValidator for HubConfig {
    fn validate(&self) -> NetpulseResult<()> {
        ValidationUtils::validate_not_empty(&self.hub_id, "hub.hub_id")?;
        ValidationUtils::validate_not_empty(&self.region, "hub.region")?;
        ValidationUtils::validate_bind_address(&self.bind_address, "hub.bind_address")?;
        ValidationUtils::validate_not_empty(&self.secret, "hub.secret")?;
        ValidationUtils::validate_not_empty(&self.agent_token_secret, "hub.agent_token_secret")?;
        ValidationUtils::validate_positive(
            u64::from(self.default_max_tasks),
            "hub.default_max_tasks",
        )?;
        if let Some(url) = &self.coordinator_url {
            ValidationUtils::validate_url(url, "hub.coordinator_url")?;
        }
        if self.default_capabilities.is_empty() {
            return Err(NetpulseError::config_error(
                "hub.default_capabilities 不能为空",
            ));
        }
        self.default_capability_set()
            .map_err(|e| NetpulseError::config_error(format!("hub.default_capabilities: {e}")))?;
        Ok(())
    }
}

/// 失联Agent上已分配子任务的处理策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// 超过宽限期后将子任务标记为失败并释放槽位
    #[default]
    Fail,
    /// 保持分配状态，仅在巡检日志中报告
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LivenessConfig {
    pub sweep_interval_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    pub orphan_policy: OrphanPolicy,
    pub orphan_grace_seconds: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 60,
            heartbeat_timeout_seconds: 300,
            orphan_policy: OrphanPolicy::Fail,
            orphan_grace_seconds: 120,
        }
    }
}

impl ConfigValidator for LivenessConfig {
    fn validate(&self) -> NetpulseResult<()> {
        ValidationUtils::validate_timeout_seconds(
            self.sweep_interval_seconds,
            "liveness.sweep_interval_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.heartbeat_timeout_seconds,
            "liveness.heartbeat_timeout_seconds",
        )?;
        Ok(())
    }
}

/// 进程内Agent使用的探测执行器
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// 返回固定格式的模拟结果
    #[default]
    Simulated,
    /// http/https 发起真实请求
    Http,
}

/// Agent轮询节奏
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub active_interval_ms: u64,
    pub idle_interval_ms: u64,
    pub busy_interval_ms: u64,
    pub error_min_ms: u64,
    pub error_max_ms: u64,
    pub jitter_ratio: f64,
    /// 每隔多少次轮询主动发送一次心跳
    pub heartbeat_every_polls: u32,
    pub probe: ProbeKind,
    pub probe_timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            active_interval_ms: 5_000,
            idle_interval_ms: 10_000,
            busy_interval_ms: 30_000,
            error_min_ms: 1_000,
            error_max_ms: 60_000,
            jitter_ratio: 0.1,
            heartbeat_every_polls: 6,
            probe: ProbeKind::Simulated,
            probe_timeout_seconds: 10,
        }
    }
}

impl AgentConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

impl ConfigValidator for AgentConfig {
    fn validate(&self) -> NetpulseResult<()> {
        ValidationUtils::validate_positive(self.active_interval_ms, "agent.active_interval_ms")?;
        ValidationUtils::validate_positive(self.idle_interval_ms, "agent.idle_interval_ms")?;
        if self.busy_interval_ms < 30_000 {
            return Err(NetpulseError::config_error(
                "agent.busy_interval_ms 不能小于 30000",
            ));
        }
        ValidationUtils::validate_positive(self.error_min_ms, "agent.error_min_ms")?;
        if self.error_min_ms > self.error_max_ms {
            return Err(NetpulseError::config_error(
                "agent.error_min_ms 不能大于 agent.error_max_ms",
            ));
        }
        if !(0.0..=0.5).contains(&self.jitter_ratio) {
            return Err(NetpulseError::config_error(
                "agent.jitter_ratio 必须在 0.0 到 0.5 之间",
            ));
        }
        ValidationUtils::validate_positive(
            u64::from(self.heartbeat_every_polls),
            "agent.heartbeat_every_polls",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.probe_timeout_seconds,
            "agent.probe_timeout_seconds",
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// pretty 或 json
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_bind: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_bind: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> NetpulseResult<()> {
        let levels = ["trace", "debug", "info", "warn", "error"];
        if !levels.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(NetpulseError::config_error(format!(
                "无效的日志级别: {}，可选: {levels:?}",
                self.log_level
            )));
        }
        if !["pretty", "json"].contains(&self.log_format.as_str()) {
            return Err(NetpulseError::config_error(format!(
                "无效的日志格式: {}，可选: pretty, json",
                self.log_format
            )));
        }
        if self.metrics_enabled {
            ValidationUtils::validate_bind_address(
                &self.metrics_bind,
                "observability.metrics_bind",
            )?;
        }
        Ok(())
    }
}
