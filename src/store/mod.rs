use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Issue, Project, User};

pub mod memory;
pub mod postgres_backend;

pub use memory::MemoryStore;
pub use postgres_backend::PostgresStore;

/// 存储层的行表示：一个 JSON 对象
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("存储错误: {0}")]
    Backend(String),

    #[error("{table} 行格式错误: {source}")]
    Malformed {
        table: String,
        source: serde_json::Error,
    },

    #[error("唯一约束冲突: {0}")]
    Conflict(String),
}

/// 可以存入记录存储的类型化记录。
///
/// 存储表示就是记录的 serde JSON 对象，`to_row`/`from_row` 是各资源共用的转换约定。
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> &str;

    fn to_row(&self) -> Result<Row, StoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(row)) => Ok(row),
            Ok(other) => Err(StoreError::Backend(format!(
                "{} 记录序列化结果不是对象: {}",
                Self::TABLE,
                other
            ))),
            Err(source) => Err(StoreError::Malformed {
                table: Self::TABLE.to_string(),
                source,
            }),
        }
    }

    fn from_row(row: Value) -> Result<Self, StoreError> {
        serde_json::from_value(row).map_err(|source| StoreError::Malformed {
            table: Self::TABLE.to_string(),
            source,
        })
    }
}

/// 按列等值过滤，多个条件之间为 AND；空过滤器匹配所有行
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 插入一行，返回存储后的行
    async fn insert(&self, table: &str, row: Row) -> Result<Value, StoreError>;

    /// 按 id 查找
    async fn find_by_id(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// 按过滤条件列出
    async fn find_all(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    /// 覆盖更新一行，行不存在时返回 None
    async fn update(&self, table: &str, id: &str, row: Row) -> Result<Option<Value>, StoreError>;

    /// 删除一行，返回是否确实删除
    async fn delete(&self, table: &str, id: &str) -> Result<bool, StoreError>;
}

/// 某一资源类型的类型化仓库
pub struct Repository<R> {
    store: Arc<dyn RecordStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Repository<R> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub async fn create(&self, record: &R) -> Result<R, StoreError> {
        let row = record.to_row()?;
        let stored = self.store.insert(R::TABLE, row).await?;
        R::from_row(stored)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<R>, StoreError> {
        self.store
            .find_by_id(R::TABLE, id)
            .await?
            .map(R::from_row)
            .transpose()
    }

    pub async fn find_all(&self, filter: &Filter) -> Result<Vec<R>, StoreError> {
        self.store
            .find_all(R::TABLE, filter)
            .await?
            .into_iter()
            .map(R::from_row)
            .collect()
    }

    /// 写回整条记录并刷新 updated_at
    pub async fn update(&self, record: &R) -> Result<Option<R>, StoreError> {
        let mut row = record.to_row()?;
        row.remove("created_at");
        row.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        self.store
            .update(R::TABLE, record.id(), row)
            .await?
            .map(R::from_row)
            .transpose()
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(R::TABLE, id).await
    }
}

impl Repository<User> {
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let mut users = self.find_all(&Filter::new().eq("email", email)).await?;
        Ok(if users.is_empty() {
            None
        } else {
            Some(users.swap_remove(0))
        })
    }
}

impl Repository<Project> {
    pub async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Project>, StoreError> {
        self.find_all(&Filter::new().eq("owner_id", owner_id)).await
    }
}

impl Repository<Issue> {
    pub async fn find_by_project(&self, project_id: &str) -> Result<Vec<Issue>, StoreError> {
        self.find_all(&Filter::new().eq("project_id", project_id))
            .await
    }

    pub async fn find_by_assignee(&self, assignee_id: &str) -> Result<Vec<Issue>, StoreError> {
        self.find_all(&Filter::new().eq("assignee_id", assignee_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueStatus;
    use serde_json::json;

    fn store() -> Arc<dyn RecordStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn filter_requires_every_condition() {
        let row = json!({"owner_id": "u1", "status": "active"});
        let row = row.as_object().unwrap();

        assert!(Filter::new().matches(row));
        assert!(Filter::new().eq("owner_id", "u1").matches(row));
        assert!(!Filter::new()
            .eq("owner_id", "u1")
            .eq("status", "paused")
            .matches(row));
        assert!(!Filter::new().eq("missing", "x").matches(row));
    }

    #[actix_web::test]
    async fn repository_round_trips_typed_records() {
        let projects: Repository<Project> = Repository::new(store());
        let project = Project::new("Kanban", "board", "owner-1");

        let created = projects.create(&project).await.unwrap();
        assert_eq!(created, project);

        let found = projects.find_by_id(&project.id).await.unwrap();
        assert_eq!(found, Some(project.clone()));
        assert!(projects.find_by_id("nope").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn update_refreshes_timestamp_and_keeps_creation_time() {
        let issues: Repository<Issue> = Repository::new(store());
        let mut issue = Issue::new("Crash", "", "p1", "u1");
        issues.create(&issue).await.unwrap();

        issue.status = IssueStatus::Done;
        let updated = issues.update(&issue).await.unwrap().unwrap();

        assert_eq!(updated.status, IssueStatus::Done);
        assert_eq!(updated.created_at, issue.created_at);
        assert!(updated.updated_at >= issue.updated_at);
    }

    #[actix_web::test]
    async fn update_of_missing_record_is_none() {
        let issues: Repository<Issue> = Repository::new(store());
        let issue = Issue::new("Ghost", "", "p1", "u1");

        assert!(issues.update(&issue).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn finders_filter_by_column() {
        let shared = store();
        let users: Repository<User> = Repository::new(shared.clone());
        let issues: Repository<Issue> = Repository::new(shared);

        let alice = User::new("a@x.com", "hash".to_string(), "Alice");
        users.create(&alice).await.unwrap();
        assert_eq!(
            users.find_by_email("a@x.com").await.unwrap().map(|u| u.id),
            Some(alice.id.clone())
        );
        assert!(users.find_by_email("b@x.com").await.unwrap().is_none());

        let mut assigned = Issue::new("One", "", "p1", "u1");
        assigned.assignee_id = Some(alice.id.clone());
        issues.create(&assigned).await.unwrap();
        issues.create(&Issue::new("Two", "", "p2", "u1")).await.unwrap();

        assert_eq!(issues.find_by_project("p1").await.unwrap().len(), 1);
        assert_eq!(issues.find_by_assignee(&alice.id).await.unwrap().len(), 1);
        assert_eq!(issues.find_all(&Filter::new()).await.unwrap().len(), 2);
    }
}
