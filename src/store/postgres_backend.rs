use async_trait::async_trait;
use log::{debug, error};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::store::{Filter, RecordStore, Row, StoreError};

/// 基于 Postgres 的记录存储。
///
/// 行以 JSON 对象进出：写入走 `jsonb_populate_record`，读取走 `to_jsonb`，
/// 因此三张表共用同一套 SQL，不需要编译期数据库。
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 表名、列名只允许小写字母、数字和下划线
fn checked_ident(name: &str) -> Result<&str, StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::Backend(format!("非法标识符: {:?}", name)))
    }
}

fn map_sqlx_error(context: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Conflict(format!("{}: {}", context, db.message()));
        }
    }
    error!("{}失败: {}", context, e);
    StoreError::Backend(format!("{}失败: {}", context, e))
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn insert(&self, table: &str, row: Row) -> Result<Value, StoreError> {
        let table = checked_ident(table)?;
        let sql = format!(
            "INSERT INTO {table} AS t \
             SELECT * FROM jsonb_populate_record(NULL::{table}, $1) \
             RETURNING to_jsonb(t)"
        );
        debug!("插入 {} 行", table);

        sqlx::query_scalar::<_, Value>(&sql)
            .bind(Json(Value::Object(row)))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("插入 {}", table), e))
    }

    async fn find_by_id(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let table = checked_ident(table)?;
        let sql = format!("SELECT to_jsonb(t) FROM {table} t WHERE t.id = $1");

        sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("查询 {}", table), e))
    }

    async fn find_all(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let table = checked_ident(table)?;
        let mut sql = format!("SELECT to_jsonb(t) FROM {table} t WHERE TRUE");
        for i in 0..filter.conditions().len() {
            sql.push_str(&format!(
                " AND to_jsonb(t) -> ${}::text = ${}::jsonb",
                2 * i + 1,
                2 * i + 2
            ));
        }
        sql.push_str(" ORDER BY t.created_at");

        let mut query = sqlx::query_scalar::<_, Value>(&sql);
        for (column, value) in filter.conditions() {
            query = query.bind(column.clone()).bind(Json(value.clone()));
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("列出 {}", table), e))
    }

    async fn update(&self, table: &str, id: &str, row: Row) -> Result<Option<Value>, StoreError> {
        let table = checked_ident(table)?;
        let columns = row
            .keys()
            .filter(|k| k.as_str() != "id")
            .map(|k| checked_ident(k))
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return self.find_by_id(table, id).await;
        }
        let columns = columns.join(", ");
        let sql = format!(
            "UPDATE {table} AS t \
             SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) \
             WHERE t.id = $2 RETURNING to_jsonb(t)"
        );

        sqlx::query_scalar::<_, Value>(&sql)
            .bind(Json(Value::Object(row)))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("更新 {}", table), e))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool, StoreError> {
        let table = checked_ident(table)?;
        let sql = format!("DELETE FROM {table} WHERE id = $1");

        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("删除 {}", table), e))?;
        Ok(result.rows_affected() > 0)
    }
}
