use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use netpulse_errors::NetpulseError;
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Netpulse(#[from] NetpulseError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Netpulse(NetpulseError::unauthorized(message))
    }

    pub fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Netpulse(err) => match err {
                NetpulseError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                NetpulseError::TaskNotFound { .. } => (StatusCode::NOT_FOUND, "TASK_NOT_FOUND"),
                NetpulseError::AgentNotFound { .. } => (StatusCode::NOT_FOUND, "AGENT_NOT_FOUND"),
                NetpulseError::UnknownRegion { .. } => (StatusCode::BAD_REQUEST, "UNKNOWN_REGION"),
                NetpulseError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
                NetpulseError::UpstreamUnavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_UNAVAILABLE")
                }
                NetpulseError::Registry(_) => (StatusCode::INTERNAL_SERVER_ERROR, "REGISTRY_ERROR"),
                NetpulseError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
                }
                NetpulseError::Configuration(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
                }
                NetpulseError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let message = self.to_string();

        if status.is_server_error() {
            error!("请求处理失败 [{}]: {}", error_type, message);
        } else {
            warn!("请求被拒绝 [{}]: {}", error_type, message);
        }

        let body = json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (NetpulseError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (NetpulseError::task_not_found("t"), StatusCode::NOT_FOUND),
            (NetpulseError::agent_not_found("a"), StatusCode::NOT_FOUND),
            (NetpulseError::unknown_region("mars"), StatusCode::BAD_REQUEST),
            (NetpulseError::invalid_argument("x"), StatusCode::BAD_REQUEST),
            (NetpulseError::upstream("down"), StatusCode::INTERNAL_SERVER_ERROR),
            (NetpulseError::registry("down"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_and_type().0, expected);
        }
    }
}
