use actix_web::{web, HttpResponse};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;

use super::{owned_project, present};
use crate::auth::Principal;
use crate::error::AppError;
use crate::models::{Project, ProjectStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProject {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProject {
    name: Option<String>,
    description: Option<String>,
    status: Option<ProjectStatus>,
}

/// POST /api/projects
pub async fn create(
    principal: Principal,
    body: web::Json<CreateProject>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let CreateProject { name, description } = body.into_inner();
    let Some(name) = present(name) else {
        warn!("创建项目缺少名称");
        return Err(AppError::Validation("Project name is required".to_string()));
    };

    let project = Project::new(
        name.trim(),
        description.as_deref().unwrap_or_default(),
        &principal.id,
    );
    let project = data.projects.create(&project).await?;
    info!("用户 {} 创建项目 {}", principal.id, project.id);

    Ok(HttpResponse::Created().json(json!({ "project": project })))
}

/// GET /api/projects
pub async fn list(
    principal: Principal,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let projects = data.projects.find_by_owner(&principal.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "projects": projects })))
}

/// GET /api/projects/{id}
pub async fn get(
    principal: Principal,
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let project = owned_project(&data, &principal, &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "project": project })))
}

/// PUT /api/projects/{id}
pub async fn update(
    principal: Principal,
    path: web::Path<String>,
    body: web::Json<UpdateProject>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let mut project = owned_project(&data, &principal, &path).await?;
    let UpdateProject {
        name,
        description,
        status,
    } = body.into_inner();

    if let Some(name) = present(name) {
        project.name = name.trim().to_string();
    }
    if let Some(description) = description {
        project.description = description;
    }
    if let Some(status) = status {
        project.status = status;
    }

    let project = data
        .projects
        .update(&project)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    info!("项目 {} 已更新", project.id);

    Ok(HttpResponse::Ok().json(json!({ "project": project })))
}

/// DELETE /api/projects/{id}，连同其下的问题一起删除
pub async fn delete(
    principal: Principal,
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let project = owned_project(&data, &principal, &path).await?;

    for issue in data.issues.find_by_project(&project.id).await? {
        data.issues.delete(&issue.id).await?;
    }
    data.projects.delete(&project.id).await?;
    info!("用户 {} 删除项目 {}", principal.id, project.id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Project deleted successfully" })))
}

/// GET /api/projects/{id}/issues
pub async fn issues(
    principal: Principal,
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let project = owned_project(&data, &principal, &path).await?;
    let issues = data.issues.find_by_project(&project.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "issues": issues })))
}
