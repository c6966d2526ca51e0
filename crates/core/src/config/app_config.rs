use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use netpulse_errors::NetpulseResult;
use serde::{Deserialize, Serialize};

use super::sections::{
    AgentConfig, CoordinatorConfig, HubConfig, LivenessConfig, ObservabilityConfig,
    RegistryConfig,
};
use super::validation::ConfigValidator;

pub const DEFAULT_CONFIG_PATH: &str = "config/netpulse.toml";
pub const ENV_PREFIX: &str = "NETPULSE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub registry: RegistryConfig,
    pub coordinator: CoordinatorConfig,
    pub hub: HubConfig,
    pub liveness: LivenessConfig,
    pub agent: AgentConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载配置
    ///
    /// 显式指定的文件必须存在；未指定时默认文件可选。
    /// 环境变量 `NETPULSE_<SECTION>__<KEY>` 覆盖文件中的值。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(anyhow::anyhow!("配置文件不存在: {}", path));
                }
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
            None => {
                builder = builder
                    .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate().context("配置校验失败")?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate().context("配置校验失败")?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> NetpulseResult<()> {
        self.registry.validate()?;
        self.coordinator.validate()?;
        self.hub.validate()?;
        self.liveness.validate()?;
        self.agent.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
