use actix_web::web;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthMiddleware, Principal, TokenService};
use crate::error::AppError;
use crate::models::{Issue, Project};
use crate::policy::AccessPolicy;
use crate::state::AppState;

mod auth;
mod health;
mod issues;
mod projects;

/// 注册全部路由
pub fn configure(cfg: &mut web::ServiceConfig, tokens: Arc<TokenService>) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .route("/health", web::get().to(health::health))
    .service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(auth::login))
                    .route("/register", web::post().to(auth::register))
                    .service(
                        web::resource("/profile")
                            .wrap(AuthMiddleware::new(tokens.clone()))
                            .route(web::get().to(auth::profile)),
                    ),
            )
            .service(
                web::scope("/projects")
                    .wrap(AuthMiddleware::new(tokens.clone()))
                    .route("", web::post().to(projects::create))
                    .route("", web::get().to(projects::list))
                    .route("/{id}", web::get().to(projects::get))
                    .route("/{id}", web::put().to(projects::update))
                    .route("/{id}", web::delete().to(projects::delete))
                    .route("/{id}/issues", web::get().to(projects::issues)),
            )
            .service(
                web::scope("/issues")
                    .wrap(AuthMiddleware::new(tokens))
                    .route("", web::post().to(issues::create))
                    .route("", web::get().to(issues::list))
                    .route("/{id}", web::get().to(issues::get))
                    .route("/{id}", web::put().to(issues::update))
                    .route("/{id}", web::delete().to(issues::delete)),
            ),
    );
}

/// 缺失或空白的字段视为未提供
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 区分字段缺失（None）与显式 null（Some(None)）
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// 锁定剩余时间，按秒向上取整
fn ceil_secs(duration: Duration) -> u64 {
    ((duration.as_millis() + 999) / 1000) as u64
}

/// 先查存在，再查所有权
async fn owned_project(
    data: &AppState,
    principal: &Principal,
    id: &str,
) -> Result<Project, AppError> {
    let project = data.projects.find_by_id(id).await?;
    AccessPolicy::project_access(principal, project)
}

async fn owned_issue(data: &AppState, principal: &Principal, id: &str) -> Result<Issue, AppError> {
    let issue = data.issues.find_by_id(id).await?;
    let project = match &issue {
        Some(issue) => data.projects.find_by_id(&issue.project_id).await?,
        None => None,
    };
    AccessPolicy::issue_access(principal, issue, project.as_ref())
}
