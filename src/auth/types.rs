use serde::{Deserialize, Serialize};

use crate::models::Role;

/// 令牌载荷
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    pub id: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// 通过令牌验证后挂在请求上的身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// 某个登录标识的失败记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginAttempt {
    pub count: u32,
    /// 锁定截止时间（毫秒时间戳），None 表示未锁定
    pub lock_until: Option<i64>,
}

/// 登录尝试快照，序列化后直接作为 401 响应的一部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptInfo {
    pub attempts: u32,
    pub remaining_attempts: u32,
    pub is_locked: bool,
    /// 毫秒
    pub lock_time: u64,
}
