use actix_web::{web, HttpResponse};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{ceil_secs, present};
use crate::auth::{hash_password, verify_password, Principal};
use crate::error::AppError;
use crate::models::{PublicUser, User};
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Validate)]
struct NewAccount {
    #[validate(email(message = "Invalid email address"))]
    email: String,
    #[validate(length(min = 6, max = 72, message = "Password must be 6 to 72 characters"))]
    password: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    name: String,
}

/// POST /api/auth/login
pub async fn login(
    body: web::Json<LoginRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("开始处理登录请求");
    let LoginRequest { email, password } = body.into_inner();
    let (email, password) = match (present(email), present(password)) {
        (Some(email), Some(password)) => (email.trim().to_string(), password),
        _ => {
            warn!("登录参数不足");
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }
    };

    // 锁定期内直接拒绝，不再校验密码
    if data.guard.is_locked(&email) {
        let remaining = data.guard.remaining_lock_time(&email);
        return Err(AppError::RateLimited {
            lock_time_remaining: ceil_secs(remaining),
        });
    }

    let user = match data.users.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            warn!("用户 {} 不存在", email);
            let info = data.guard.record_failed_attempt(&email);
            return Err(AppError::InvalidCredentials(info));
        }
    };

    let hashed = user.password_hash.clone();
    let matched = web::block(move || verify_password(&password, &hashed)).await?;
    if !matched {
        warn!("用户 {} 密码错误", email);
        let info = data.guard.record_failed_attempt(&email);
        return Err(AppError::InvalidCredentials(info));
    }

    data.guard.record_successful_attempt(&email);
    let token = data.tokens.issue_token(&user.principal())?;
    info!("用户 {} 登录成功", email);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Login successful",
        "token": token,
        "user": PublicUser::from(&user),
    })))
}

/// POST /api/auth/register
pub async fn register(
    body: web::Json<RegisterRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("开始处理注册请求");
    let RegisterRequest {
        email,
        password,
        name,
    } = body.into_inner();
    let account = match (present(email), present(password), present(name)) {
        (Some(email), Some(password), Some(name)) => NewAccount {
            email: email.trim().to_string(),
            password,
            name: name.trim().to_string(),
        },
        _ => {
            warn!("注册参数不足");
            return Err(AppError::Validation(
                "Email, password, and name are required".to_string(),
            ));
        }
    };
    account.validate()?;

    if data.users.find_by_email(&account.email).await?.is_some() {
        warn!("邮箱已注册: {}", account.email);
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let NewAccount {
        email,
        password,
        name,
    } = account;
    let password_hash = web::block(move || hash_password(&password)).await??;
    let user = data
        .users
        .create(&User::new(&email, password_hash, &name))
        .await
        .map_err(|e| match e {
            // 并发注册同一邮箱时由唯一约束兜底
            StoreError::Conflict(detail) => {
                warn!("邮箱已注册: {} ({})", email, detail);
                AppError::Conflict("User already exists".to_string())
            }
            other => other.into(),
        })?;
    let token = data.tokens.issue_token(&user.principal())?;
    info!("用户注册成功: {}", email);

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "token": token,
        "user": PublicUser::from(&user),
    })))
}

/// GET /api/auth/profile
pub async fn profile(
    principal: Principal,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    debug!("获取用户 {} 的资料", principal.id);
    let user = data.users.find_by_id(&principal.id).await?.ok_or_else(|| {
        warn!("token 对应的用户 {} 已不存在", principal.id);
        AppError::Unauthenticated("Invalid token - user not found".to_string())
    })?;

    Ok(HttpResponse::Ok().json(json!({ "user": PublicUser::from(&user) })))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{call, register, request, state, test_app, PASSWORD};
    use crate::auth::{GuardConfig, LoginAttemptGuard, TokenService};
    use crate::classifier::DisabledClassifier;
    use crate::state::AppState;
    use crate::store::{Filter, MemoryStore, RecordStore, Row, StoreError};
    use actix_web::http::{Method, StatusCode};
    use actix_web::web;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn login(email: &str, password: &str) -> actix_web::test::TestRequest {
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
    }

    #[actix_web::test]
    async fn register_then_login() {
        let (state, _) = state();
        let app = test_app!(state);
        let (token, id) = register(&app, "a@x.com").await;
        assert!(!token.is_empty());

        let (status, body) = call(&app, login("a@x.com", PASSWORD)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["user"]["id"], id.as_str());
        assert!(body["user"].get("password_hash").is_none());

        let principal = state
            .tokens
            .verify_token(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(principal.id, id);
        assert_eq!(principal.email, "a@x.com");
    }

    #[actix_web::test]
    async fn padded_email_logs_in_and_counts_against_the_account() {
        let (state, _) = state();
        let app = test_app!(state);
        register(&app, " a@x.com ").await;

        let (status, body) = call(&app, login(" a@x.com ", PASSWORD)).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["user"]["email"], "a@x.com");

        call(&app, login(" a@x.com ", "wrong-password")).await;
        assert_eq!(state.guard.attempt_info("a@x.com").attempts, 1);
        assert_eq!(state.guard.attempt_info(" a@x.com ").attempts, 0);
    }

    #[actix_web::test]
    async fn duplicate_registration_conflicts() {
        let (state, _) = state();
        let app = test_app!(state);
        register(&app, "a@x.com").await;

        let body = json!({ "email": "a@x.com", "password": PASSWORD, "name": "Again" });
        let (status, body) = call(
            &app,
            request(Method::POST, "/api/auth/register", None, Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User already exists");
    }

    /// 查找永远看不到已有行，模拟两个注册请求同时通过存在性检查
    struct StaleLookupStore(MemoryStore);

    #[async_trait]
    impl RecordStore for StaleLookupStore {
        async fn insert(&self, table: &str, row: Row) -> Result<Value, StoreError> {
            self.0.insert(table, row).await
        }

        async fn find_by_id(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError> {
            self.0.find_by_id(table, id).await
        }

        async fn find_all(&self, _table: &str, _filter: &Filter) -> Result<Vec<Value>, StoreError> {
            Ok(Vec::new())
        }

        async fn update(
            &self,
            table: &str,
            id: &str,
            row: Row,
        ) -> Result<Option<Value>, StoreError> {
            self.0.update(table, id, row).await
        }

        async fn delete(&self, table: &str, id: &str) -> Result<bool, StoreError> {
            self.0.delete(table, id).await
        }
    }

    #[actix_web::test]
    async fn concurrent_registration_reports_existing_user() {
        let state = web::Data::new(AppState::new(
            Arc::new(StaleLookupStore(MemoryStore::new())),
            LoginAttemptGuard::new(GuardConfig::default()),
            Arc::new(TokenService::new(b"api-test-secret")),
            Arc::new(DisabledClassifier),
            Duration::from_millis(200),
        ));
        let app = test_app!(state);
        register(&app, "a@x.com").await;

        let body = json!({ "email": "a@x.com", "password": PASSWORD, "name": "Again" });
        let (status, body) = call(
            &app,
            request(Method::POST, "/api/auth/register", None, Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({ "error": "User already exists" }));
    }

    #[actix_web::test]
    async fn registration_validates_input() {
        let (state, _) = state();
        let app = test_app!(state);

        let missing = json!({ "email": "a@x.com", "password": PASSWORD });
        let (status, body) = call(
            &app,
            request(Method::POST, "/api/auth/register", None, Some(missing)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email, password, and name are required");

        let bad_email = json!({ "email": "nope", "password": PASSWORD, "name": "N" });
        let (status, _) = call(
            &app,
            request(Method::POST, "/api/auth/register", None, Some(bad_email)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn login_requires_both_fields() {
        let (state, _) = state();
        let app = test_app!(state);

        let (status, body) = call(
            &app,
            request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "a@x.com" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email and password are required");
        assert_eq!(state.guard.attempt_info("a@x.com").attempts, 0);
    }

    #[actix_web::test]
    async fn malformed_json_is_a_validation_error() {
        let (state, _) = state();
        let app = test_app!(state);

        let req = actix_web::test::TestRequest::post()
            .uri("/api/auth/login")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json");
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn failed_logins_report_remaining_attempts() {
        let (state, _) = state();
        let app = test_app!(state);
        register(&app, "a@x.com").await;

        let (status, body) = call(&app, login("a@x.com", "wrong-password")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
        assert_eq!(body["attempts"], 1);
        assert_eq!(body["remainingAttempts"], 2);
        assert_eq!(body["isLocked"], false);
        assert_eq!(body["lockTime"], 0);

        // 不存在的用户同样计数
        let (status, body) = call(&app, login("ghost@x.com", "whatever")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["attempts"], 1);
    }

    #[actix_web::test]
    async fn third_failure_locks_even_the_correct_password() {
        let (state, _) = state();
        let app = test_app!(state);
        register(&app, "a@x.com").await;

        for _ in 0..2 {
            call(&app, login("a@x.com", "wrong-password")).await;
        }
        let (status, body) = call(&app, login("a@x.com", "wrong-password")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["isLocked"], true);
        assert_eq!(body["lockTime"], 180_000);

        let (status, body) = call(&app, login("a@x.com", PASSWORD)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body["error"],
            "Account temporarily locked due to too many failed attempts"
        );
        assert_eq!(body["lockTimeRemaining"], 180);
        // 锁定期的请求不再计数
        assert_eq!(state.guard.attempt_info("a@x.com").attempts, 3);
    }

    #[actix_web::test]
    async fn lock_lifts_after_window() {
        let (state, clock) = state();
        let app = test_app!(state);
        register(&app, "a@x.com").await;
        for _ in 0..3 {
            call(&app, login("a@x.com", "wrong-password")).await;
        }

        clock.advance(Duration::from_millis(179_500));
        let (status, body) = call(&app, login("a@x.com", PASSWORD)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["lockTimeRemaining"], 1);

        clock.advance(Duration::from_millis(500));
        let (status, _) = call(&app, login("a@x.com", PASSWORD)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[actix_web::test]
    async fn success_clears_earlier_failures() {
        let (state, _) = state();
        let app = test_app!(state);
        register(&app, "a@x.com").await;

        for _ in 0..2 {
            call(&app, login("a@x.com", "wrong-password")).await;
        }
        let (status, _) = call(&app, login("a@x.com", PASSWORD)).await;
        assert_eq!(status, StatusCode::OK);

        let info = state.guard.attempt_info("a@x.com");
        assert_eq!(info.attempts, 0);
        assert!(!info.is_locked);
    }

    #[actix_web::test]
    async fn profile_returns_current_user() {
        let (state, _) = state();
        let app = test_app!(state);
        let (token, id) = register(&app, "a@x.com").await;

        let (status, body) = call(
            &app,
            request(Method::GET, "/api/auth/profile", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], id.as_str());
        assert!(body["user"].get("password_hash").is_none());

        let (status, _) = call(&app, request(Method::GET, "/api/auth/profile", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn profile_of_deleted_user_is_401() {
        let (state, _) = state();
        let app = test_app!(state);
        let (token, id) = register(&app, "a@x.com").await;
        state.users.delete(&id).await.unwrap();

        let (status, body) = call(
            &app,
            request(Method::GET, "/api/auth/profile", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token - user not found");
    }
}
