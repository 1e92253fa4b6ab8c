use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use log::{error, warn};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::auth::{AttemptInfo, TokenError};
use crate::store::StoreError;

/// 控制器层统一的错误类型，每个变体对应一个 HTTP 状态码
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("Invalid credentials")]
    InvalidCredentials(AttemptInfo),

    #[error("Access denied")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Account temporarily locked due to too many failed attempts")]
    RateLimited {
        /// 秒，向上取整
        lock_time_remaining: u64,
    },

    #[error("Internal server error")]
    Unexpected(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) | AppError::InvalidCredentials(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::InvalidCredentials(info) => json!({
                "error": self.to_string(),
                "attempts": info.attempts,
                "remainingAttempts": info.remaining_attempts,
                "isLocked": info.is_locked,
                "lockTime": info.lock_time,
            }),
            AppError::RateLimited {
                lock_time_remaining,
            } => json!({
                "error": self.to_string(),
                "lockTimeRemaining": lock_time_remaining,
            }),
            AppError::Unexpected(detail) => {
                // 细节只进日志，不返回给调用方
                error!("服务器内部错误: {}", detail);
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(detail) => {
                warn!("唯一约束冲突: {}", detail);
                AppError::Conflict("Resource already exists".to_string())
            }
            other => AppError::Unexpected(other.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidToken => AppError::Unauthenticated("Invalid token".to_string()),
            TokenError::Signing(e) => AppError::Unexpected(format!("签发 token 失败: {}", e)),
        }
    }
}

impl From<BlockingError> for AppError {
    fn from(e: BlockingError) -> Self {
        AppError::Unexpected(format!("阻塞任务失败: {}", e))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Unexpected(format!("密码加密失败: {}", e))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}
