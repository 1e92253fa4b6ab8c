use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Principal;
use crate::store::Record;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// 用户记录，包含密码哈希，绝不直接返回给客户端
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, password_hash: String, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
            name: name.to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

impl Record for User {
    const TABLE: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

/// 对外展示的用户信息（去掉密码哈希）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    #[serde(default)]
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: &str, description: &str, owner_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            owner_id: owner_id.to_string(),
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Project {
    const TABLE: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub project_id: String,
    #[serde(default)]
    pub assignee_id: Option<String>,
    pub reporter_id: String,
    #[serde(default)]
    pub status: IssueStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    pub fn new(title: &str, description: &str, project_id: &str, reporter_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            project_id: project_id.to_string(),
            assignee_id: None,
            reporter_id: reporter_id.to_string(),
            status: IssueStatus::Todo,
            priority: Priority::Medium,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Issue {
    const TABLE: &'static str = "issues";

    fn id(&self) -> &str {
        &self.id
    }
}
