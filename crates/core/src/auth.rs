//! 跨层短期令牌
//!
//! 协调器与区域节点之间的每次调用都携带一个用区域密钥签名的 HS256 JWT，
//! 接收方校验签名、过期时间和区域。

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use netpulse_errors::{NetpulseError, NetpulseResult};
use serde::{Deserialize, Serialize};

pub const ISSUER_COORDINATOR: &str = "coordinator";
pub const ISSUER_HUB: &str = "hub";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierClaims {
    /// 调用方所在层
    pub iss: String,
    pub region: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TierTokenService {
    region: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl TierTokenService {
    pub fn new(region: impl Into<String>, secret: &str, ttl_seconds: u64) -> Self {
        Self {
            region: region.into(),
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn issue(&self, issuer: &str) -> NetpulseResult<String> {
        let now = Utc::now();
        let claims = TierClaims {
            iss: issuer.to_string(),
            region: self.region.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.ttl_seconds)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| NetpulseError::Internal(format!("签发跨层令牌失败: {e}")))
    }

    /// 校验令牌，`expected_issuer` 为 `None` 时不限制签发方
    pub fn verify(&self, token: &str, expected_issuer: Option<&str>) -> NetpulseResult<TierClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss"]);
        if let Some(issuer) = expected_issuer {
            validation.set_issuer(&[issuer]);
        }

        let claims = decode::<TierClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    NetpulseError::unauthorized("跨层令牌已过期")
                }
                _ => NetpulseError::unauthorized(format!("跨层令牌无效: {e}")),
            })?
            .claims;

        if claims.region != self.region {
            return Err(NetpulseError::unauthorized(format!(
                "跨层令牌区域不匹配: {}",
                claims.region
            )));
        }
        Ok(claims)
    }
}
