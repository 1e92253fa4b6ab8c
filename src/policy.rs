use log::{debug, warn};
use std::collections::HashSet;

use crate::auth::Principal;
use crate::error::AppError;
use crate::models::{Issue, Project};

/// 基于所有权的访问控制。
///
/// 每次请求都重新判断，不缓存。资源是否存在先于所有权检查，
/// 所以不存在的 id 永远得到 404 而不是 403。
pub struct AccessPolicy;

impl AccessPolicy {
    /// 检查用户是否是项目所有者
    pub fn check_owner(principal: &Principal, project: &Project) -> Result<(), AppError> {
        debug!(
            "权限检查 - 用户: {}, 项目: {}, 所有者: {}",
            principal.id, project.id, project.owner_id
        );
        if principal.id == project.owner_id {
            Ok(())
        } else {
            warn!("用户 {} 无权访问项目 {}", principal.id, project.id);
            Err(AppError::Forbidden)
        }
    }

    /// 项目的读、改、删及列出其问题
    pub fn project_access(
        principal: &Principal,
        project: Option<Project>,
    ) -> Result<Project, AppError> {
        let project = project.ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
        Self::check_owner(principal, &project)?;
        Ok(project)
    }

    /// 问题的读、改、删：先确认问题存在，再按其所属项目判断所有权。
    /// 所属项目已不存在的问题没有可匹配的所有者，按拒绝处理。
    pub fn issue_access(
        principal: &Principal,
        issue: Option<Issue>,
        project: Option<&Project>,
    ) -> Result<Issue, AppError> {
        let issue = issue.ok_or_else(|| AppError::NotFound("Issue not found".to_string()))?;
        match project {
            Some(project) if project.id == issue.project_id => {
                Self::check_owner(principal, project)?;
                Ok(issue)
            }
            _ => {
                warn!("问题 {} 的所属项目不存在", issue.id);
                Err(AppError::Forbidden)
            }
        }
    }

    /// 按负责人过滤只能查自己
    pub fn check_assignee_filter(principal: &Principal, assignee_id: &str) -> Result<(), AppError> {
        if principal.id == assignee_id {
            Ok(())
        } else {
            warn!("用户 {} 试图查看 {} 的问题", principal.id, assignee_id);
            Err(AppError::Forbidden)
        }
    }

    /// 无过滤列表：只保留所属项目归当前用户的问题
    pub fn visible_issues(
        principal: &Principal,
        issues: Vec<Issue>,
        projects: &[Project],
    ) -> Vec<Issue> {
        let owned: HashSet<&str> = projects
            .iter()
            .filter(|p| p.owner_id == principal.id)
            .map(|p| p.id.as_str())
            .collect();
        issues
            .into_iter()
            .filter(|issue| owned.contains(issue.project_id.as_str()))
            .collect()
    }
}
