use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::{debug, warn};
use std::sync::Arc;

use crate::auth::{Principal, TokenService};
use crate::error::AppError;

/// 校验 Bearer token，并把 Principal 放进请求扩展
#[derive(Clone)]
pub struct AuthMiddleware {
    tokens: Arc<TokenService>,
}

impl AuthMiddleware {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Arc::new(service),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
    tokens: Arc<TokenService>,
}

/// 取出 `Authorization: Bearer <token>` 中的 token
fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let verified = match bearer_token(&req) {
            None => {
                warn!("未提供认证 token: {}", req.path());
                Err(AppError::Unauthenticated("Access token required".to_string()))
            }
            Some(token) => self.tokens.verify_token(token).map_err(|_| {
                warn!("Token 验证失败: {}", req.path());
                AppError::Unauthenticated("Invalid token".to_string())
            }),
        };

        match verified {
            Ok(principal) => {
                debug!("用户 {} 认证成功", principal.email);
                req.extensions_mut().insert(principal);
                let service = self.service.clone();
                Box::pin(async move {
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                })
            }
            Err(e) => Box::pin(ready(Ok(req.error_response(e).map_into_right_body()))),
        }
    }
}

/// 处理函数通过这个提取器拿到当前身份
impl FromRequest for Principal {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Principal>()
                .cloned()
                .ok_or_else(|| AppError::Unauthenticated("Access token required".to_string())),
        )
    }
}
