use thiserror::Error;

/// 检测调度系统统一错误类型
#[derive(Debug, Error)]
pub enum NetpulseError {
    #[error("认证失败: {0}")]
    Unauthorized(String),
    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },
    #[error("Agent未找到: {id}")]
    AgentNotFound { id: String },
    #[error("未配置的区域: {region}")]
    UnknownRegion { region: String },
    #[error("无效的参数: {0}")]
    InvalidArgument(String),
    #[error("上游服务不可用: {0}")]
    UpstreamUnavailable(String),
    #[error("注册表错误: {0}")]
    Registry(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type NetpulseResult<T> = Result<T, NetpulseError>;

impl NetpulseError {
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn task_not_found<S: Into<String>>(id: S) -> Self {
        Self::TaskNotFound { id: id.into() }
    }
    pub fn agent_not_found<S: Into<String>>(id: S) -> Self {
        Self::AgentNotFound { id: id.into() }
    }
    pub fn unknown_region<S: Into<String>>(region: S) -> Self {
        Self::UnknownRegion {
            region: region.into(),
        }
    }
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }
    pub fn registry<S: Into<String>>(msg: S) -> Self {
        Self::Registry(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 是否为查找失败（任务或Agent不存在）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            NetpulseError::TaskNotFound { .. } | NetpulseError::AgentNotFound { .. }
        )
    }

    /// 注册表和跨层调用失败可以重试，其余错误重试无意义
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetpulseError::Registry(_) | NetpulseError::UpstreamUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for NetpulseError {
    fn from(err: serde_json::Error) -> Self {
        NetpulseError::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for NetpulseError {
    fn from(err: redis::RedisError) -> Self {
        NetpulseError::Registry(err.to_string())
    }
}

impl From<reqwest::Error> for NetpulseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetpulseError::UpstreamUnavailable(format!("请求超时: {err}"))
        } else {
            NetpulseError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<anyhow::Error> for NetpulseError {
    fn from(err: anyhow::Error) -> Self {
        NetpulseError::Internal(err.to_string())
    }
}
