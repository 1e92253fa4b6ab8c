use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::store::{Filter, RecordStore, Row, StoreError};

/// 进程内记录存储，按插入顺序保存各表的行
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, table: &str, row: Row) -> Result<Value, StoreError> {
        let id = row_id(&row)
            .ok_or_else(|| StoreError::Backend(format!("{} 行缺少 id", table)))?
            .to_string();

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|r| row_id(r) == Some(id.as_str())) {
            return Err(StoreError::Conflict(format!("{}.id = {}", table, id)));
        }
        if table == "users" {
            if let Some(email) = row.get("email") {
                if rows.iter().any(|r| r.get("email") == Some(email)) {
                    return Err(StoreError::Conflict(format!("{}.email", table)));
                }
            }
        }

        debug!("内存存储插入 {}: {}", table, id);
        rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn find_by_id(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|r| row_id(r) == Some(id))
                .map(|r| Value::Object(r.clone()))
        }))
    }

    async fn find_all(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filter.matches(r))
                    .map(|r| Value::Object(r.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, table: &str, id: &str, row: Row) -> Result<Option<Value>, StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let existing = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)));

        Ok(existing.map(|existing| {
            for (column, value) in row {
                if column != "id" {
                    existing.insert(column, value);
                }
            }
            Value::Object(existing.clone())
        }))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| row_id(r) != Some(id));
        Ok(rows.len() < before)
    }
}
