//! JWT 凭证校验
//!
//! 把承载凭证解析为用户标识。令牌签发属于外围认证服务，这里只为
//! 测试和工具保留一个生成入口。

use async_trait::async_trait;
use config::AuthConfig;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::{CredentialVerifier, EventError, UserId};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub user_id: Uuid,
    /// 过期时间 (Unix timestamp)
    pub exp: i64,
}

/// 基于 jsonwebtoken 的凭证校验器
pub struct JwtCredentialVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: i64,
}

impl JwtCredentialVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_ref()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_ref()),
            expiry_hours: config.token_expiry_hours,
        }
    }

    /// 生成 token（测试与命令行工具使用）
    pub fn issue(&self, user_id: UserId) -> Result<String, EventError> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.expiry_hours);
        let claims = JwtClaims {
            user_id: user_id.into(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| EventError::authentication(format!("Token generation failed: {err}")))
    }
}

#[async_trait]
impl CredentialVerifier for JwtCredentialVerifier {
    async fn verify(&self, token: &str) -> Result<UserId, EventError> {
        if token.is_empty() {
            return Err(EventError::authentication("Token not provided"));
        }

        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| UserId::new(data.claims.user_id))
            .map_err(|err| EventError::authentication(format!("Invalid token: {err}")))
    }
}
