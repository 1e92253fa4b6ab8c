use actix_web::{web, HttpResponse};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{double_option, owned_issue, present};
use crate::auth::Principal;
use crate::classifier::tags_for;
use crate::error::AppError;
use crate::models::{Issue, IssueStatus, Priority};
use crate::policy::AccessPolicy;
use crate::state::AppState;
use crate::store::Filter;

#[derive(Debug, Deserialize)]
pub struct CreateIssue {
    title: Option<String>,
    description: Option<String>,
    project_id: Option<String>,
    assignee_id: Option<String>,
    priority: Option<Priority>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssue {
    title: Option<String>,
    description: Option<String>,
    status: Option<IssueStatus>,
    priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    assignee_id: Option<Option<String>>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct IssueQuery {
    project_id: Option<String>,
    status: Option<String>,
    assignee_id: Option<String>,
}

fn parse_status(raw: String) -> Result<IssueStatus, AppError> {
    serde_json::from_value(Value::String(raw.clone()))
        .map_err(|_| AppError::Validation(format!("Invalid status: {}", raw)))
}

/// POST /api/issues
pub async fn create(
    principal: Principal,
    body: web::Json<CreateIssue>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let CreateIssue {
        title,
        description,
        project_id,
        assignee_id,
        priority,
    } = body.into_inner();
    let (Some(title), Some(project_id)) = (present(title), present(project_id)) else {
        warn!("创建问题缺少标题或项目");
        return Err(AppError::Validation(
            "Title and project_id are required".to_string(),
        ));
    };

    let project = data.projects.find_by_id(&project_id).await?;
    let project = AccessPolicy::project_access(&principal, project)?;

    let description = description.unwrap_or_default();
    let tags = tags_for(
        data.classifier.as_ref(),
        data.classifier_timeout,
        &title,
        &description,
    )
    .await;
    debug!("问题标签: {:?}", tags);

    let mut issue = Issue::new(title.trim(), &description, &project.id, &principal.id);
    issue.assignee_id = present(assignee_id);
    issue.priority = priority.unwrap_or_default();
    issue.tags = tags;

    let issue = data.issues.create(&issue).await?;
    info!("用户 {} 在项目 {} 中创建问题 {}", principal.id, project.id, issue.id);

    Ok(HttpResponse::Created().json(json!({ "issue": issue })))
}

/// GET /api/issues?project_id=&status=&assignee_id=
pub async fn list(
    principal: Principal,
    query: web::Query<IssueQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let IssueQuery {
        project_id,
        status,
        assignee_id,
    } = query.into_inner();
    let status = present(status).map(parse_status).transpose()?;

    let issues = if let Some(project_id) = present(project_id) {
        let project = data.projects.find_by_id(&project_id).await?;
        let project = AccessPolicy::project_access(&principal, project)?;
        data.issues.find_by_project(&project.id).await?
    } else if let Some(assignee_id) = present(assignee_id) {
        AccessPolicy::check_assignee_filter(&principal, &assignee_id)?;
        data.issues.find_by_assignee(&assignee_id).await?
    } else {
        let owned = data.projects.find_by_owner(&principal.id).await?;
        let all = data.issues.find_all(&Filter::new()).await?;
        AccessPolicy::visible_issues(&principal, all, &owned)
    };

    let issues: Vec<Issue> = match status {
        Some(status) => issues.into_iter().filter(|i| i.status == status).collect(),
        None => issues,
    };

    Ok(HttpResponse::Ok().json(json!({ "issues": issues })))
}

/// GET /api/issues/{id}
pub async fn get(
    principal: Principal,
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let issue = owned_issue(&data, &principal, &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "issue": issue })))
}

/// PUT /api/issues/{id}
pub async fn update(
    principal: Principal,
    path: web::Path<String>,
    body: web::Json<UpdateIssue>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let mut issue = owned_issue(&data, &principal, &path).await?;
    let UpdateIssue {
        title,
        description,
        status,
        priority,
        assignee_id,
        tags,
    } = body.into_inner();

    if let Some(title) = present(title) {
        issue.title = title.trim().to_string();
    }
    if let Some(description) = description {
        issue.description = description;
    }
    if let Some(status) = status {
        issue.status = status;
    }
    if let Some(priority) = priority {
        issue.priority = priority;
    }
    // 显式 null 或空串表示取消指派
    if let Some(assignee_id) = assignee_id {
        issue.assignee_id = present(assignee_id);
    }
    if let Some(tags) = tags {
        issue.tags = tags;
    }

    let issue = data
        .issues
        .update(&issue)
        .await?
        .ok_or_else(|| AppError::NotFound("Issue not found".to_string()))?;
    info!("问题 {} 已更新", issue.id);

    Ok(HttpResponse::Ok().json(json!({ "issue": issue })))
}

/// DELETE /api/issues/{id}
pub async fn delete(
    principal: Principal,
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let issue = owned_issue(&data, &principal, &path).await?;
    data.issues.delete(&issue.id).await?;
    info!("用户 {} 删除问题 {}", principal.id, issue.id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Issue deleted successfully" })))
}
