//! 三层认证
//!
//! - 管理接口：HTTP Basic（协调器配置的管理员账号）
//! - 层间调用：`Authorization: Bearer <jwt>`，由区域密钥签发的短期令牌
//! - Agent接口：`X-Agent-Id` 加 `Authorization: Bearer <token>`

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use headers::{
    authorization::{Basic, Bearer},
    Authorization, HeaderMapExt,
};
use netpulse_core::{TierClaims, TierTokenService};
use netpulse_dispatcher::AGENT_ID_HEADER;
use tracing::warn;

use crate::error::ApiError;

/// 管理员账号
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let basic = headers
            .typed_get::<Authorization<Basic>>()
            .ok_or_else(|| ApiError::unauthorized("缺少管理员认证信息"))?;
        if basic.username() == self.username && basic.password() == self.password {
            Ok(())
        } else {
            warn!("管理员认证失败: 用户 {}", basic.username());
            Err(ApiError::unauthorized("管理员账号或密码错误"))
        }
    }
}

/// 管理接口中间件
pub async fn require_admin(
    State(admin): State<Arc<AdminCredentials>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    admin.check(request.headers())?;
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|bearer| bearer.token().to_string())
        .ok_or_else(|| ApiError::unauthorized("缺少 Bearer 令牌"))
}

/// 层间令牌校验器
///
/// 协调器为每个区域持有一个校验服务，区域节点只持有自己区域的一个。
#[derive(Clone)]
pub struct TierVerifier {
    services: Arc<Vec<TierTokenService>>,
    expected_issuer: &'static str,
}

impl TierVerifier {
    pub fn new(services: Vec<TierTokenService>, expected_issuer: &'static str) -> Self {
        Self {
            services: Arc::new(services),
            expected_issuer,
        }
    }

    pub fn verify(&self, token: &str) -> Result<TierClaims, ApiError> {
        for service in self.services.iter() {
            if let Ok(claims) = service.verify(token, Some(self.expected_issuer)) {
                return Ok(claims);
            }
        }
        warn!("层间令牌校验失败 (期望签发方: {})", self.expected_issuer);
        Err(ApiError::unauthorized("层间令牌无效"))
    }
}

/// 已通过校验的层间调用方
#[derive(Debug, Clone)]
pub struct TierCaller(pub TierClaims);

impl<S> FromRequestParts<S> for TierCaller
where
    TierVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let verifier = TierVerifier::from_ref(state);
        verifier.verify(&token).map(TierCaller)
    }
}

/// 请求携带的Agent凭证，由调度服务负责校验
#[derive(Debug, Clone)]
pub struct AgentCredential {
    pub agent_id: String,
    pub token: String,
}

impl<S> FromRequestParts<S> for AgentCredential
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let agent_id = parts
            .headers
            .get(AGENT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::unauthorized("缺少 X-Agent-Id 请求头"))?
            .to_string();
        let token = bearer_token(&parts.headers)?;
        Ok(Self { agent_id, token })
    }
}
