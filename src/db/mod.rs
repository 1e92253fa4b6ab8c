use crate::store::StoreError;
use log::{error, info};
use sqlx::PgPool;

pub struct DbInitializer {
    pool: PgPool,
}

impl DbInitializer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn execute(&self, sql: &str, what: &str) -> Result<(), StoreError> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("{}失败: {}", what, e)))?;
        Ok(())
    }

    /// 初始化用户表
    pub async fn init_user_tables(&self) -> Result<(), StoreError> {
        self.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR PRIMARY KEY,
                email VARCHAR UNIQUE NOT NULL,
                password_hash VARCHAR NOT NULL,
                name VARCHAR NOT NULL,
                role VARCHAR NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            "创建用户表",
        )
        .await
    }

    /// 初始化项目表
    pub async fn init_project_tables(&self) -> Result<(), StoreError> {
        self.execute(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id VARCHAR PRIMARY KEY,
                name VARCHAR NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                owner_id VARCHAR NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status VARCHAR NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'paused', 'completed')),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            "创建项目表",
        )
        .await?;

        self.execute(
            "CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id)",
            "创建项目索引",
        )
        .await
    }

    /// 初始化问题表
    pub async fn init_issue_tables(&self) -> Result<(), StoreError> {
        self.execute(
            r#"
            CREATE TABLE IF NOT EXISTS issues (
                id VARCHAR PRIMARY KEY,
                title VARCHAR NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                project_id VARCHAR NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                assignee_id VARCHAR,
                reporter_id VARCHAR NOT NULL,
                status VARCHAR NOT NULL DEFAULT 'todo'
                    CHECK (status IN ('todo', 'in_progress', 'done')),
                priority VARCHAR NOT NULL DEFAULT 'medium'
                    CHECK (priority IN ('low', 'medium', 'high')),
                tags JSONB NOT NULL DEFAULT '[]'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            "创建问题表",
        )
        .await?;

        self.execute(
            "CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id)",
            "创建问题项目索引",
        )
        .await?;

        self.execute(
            "CREATE INDEX IF NOT EXISTS idx_issues_assignee ON issues(assignee_id)",
            "创建问题负责人索引",
        )
        .await
    }
}

/// 初始化所有数据库表
pub async fn initialize_db(pool: PgPool) -> Result<(), StoreError> {
    info!("开始初始化数据库...");
    let initializer = DbInitializer::new(pool);

    initializer.init_user_tables().await.map_err(|e| {
        error!("用户表初始化失败: {:?}", e);
        e
    })?;

    initializer.init_project_tables().await.map_err(|e| {
        error!("项目表初始化失败: {:?}", e);
        e
    })?;

    initializer.init_issue_tables().await.map_err(|e| {
        error!("问题表初始化失败: {:?}", e);
        e
    })?;

    info!("数据库初始化完成");
    Ok(())
}
