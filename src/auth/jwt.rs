use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use thiserror::Error;

use crate::auth::types::{Claims, Principal};

/// 令牌有效期
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum TokenError {
    /// 签名不符、格式错误、已过期都归为这一种
    #[error("invalid token")]
    InvalidToken,

    #[error("签发 token 失败: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// 无状态的 HS256 令牌签发与校验
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue_token(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_token_at(principal, Utc::now())
    }

    pub fn issue_token_at(
        &self,
        principal: &Principal,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        debug!("为用户 {} 生成 token", principal.id);
        let claims = Claims {
            sub: principal.id.clone(),
            id: principal.id.clone(),
            email: principal.email.clone(),
            role: principal.role,
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            error!("为用户 {} 生成 token 失败: {}", principal.id, e);
            TokenError::Signing(e)
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Principal, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.into())
            .map_err(|e| {
                debug!("token 校验失败: {}", e);
                TokenError::InvalidToken
            })
    }
}
