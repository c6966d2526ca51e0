use netpulse_errors::{NetpulseError, NetpulseResult};

/// 配置校验
pub trait ConfigValidator {
    fn validate(&self) -> NetpulseResult<()>;
}

/// 通用校验工具
pub struct ValidationUtils;

impl ValidationUtils {
    pub fn validate_not_empty(value: &str, field_name: &str) -> NetpulseResult<()> {
        if value.trim().is_empty() {
            return Err(NetpulseError::config_error(format!("{field_name} 不能为空")));
        }
        Ok(())
    }

    pub fn validate_positive(value: u64, field_name: &str) -> NetpulseResult<()> {
        if value == 0 {
            return Err(NetpulseError::config_error(format!(
                "{field_name} 必须大于0"
            )));
        }
        Ok(())
    }

    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> NetpulseResult<()> {
        Self::validate_positive(timeout_seconds, field_name)?;
        if timeout_seconds > 86_400 {
            return Err(NetpulseError::config_error(format!(
                "{field_name} 不能超过86400秒"
            )));
        }
        Ok(())
    }

    pub fn validate_url(url: &str, field_name: &str) -> NetpulseResult<()> {
        Self::validate_not_empty(url, field_name)?;
        if !url.contains("://") {
            return Err(NetpulseError::config_error(format!(
                "{field_name} 必须是带协议的URL: {url}"
            )));
        }
        Ok(())
    }

    pub fn validate_bind_address(address: &str, field_name: &str) -> NetpulseResult<()> {
        address
            .parse::<std::net::SocketAddr>()
            .map(|_| ())
            .map_err(|_| {
                NetpulseError::config_error(format!("{field_name} 不是有效的监听地址: {address}"))
            })
    }
}
