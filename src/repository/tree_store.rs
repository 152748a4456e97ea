// ==========================================
// 管件安装估价系统 - 条目树文档存储
// ==========================================
// 职责: 根条目计算完成后保存整棵树（品类标签的嵌套记录），
//       重新加载时经 instantiate 重新校验全部约束
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::item::{instantiate, Item};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 条目树存储（外部协作方边界）
pub trait TreeStore: Send + Sync {
    /// 保存整棵树，返回新的修订号
    fn save_tree(&self, document_id: &str, root: &Item) -> RepositoryResult<i64>;

    /// 加载整棵树（不存在返回 None）
    fn load_tree(&self, document_id: &str) -> RepositoryResult<Option<Item>>;
}

/// 已保存文档的元信息
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocumentInfo {
    pub document_id: String,
    pub revision: i64,
    pub saved_at: DateTime<Utc>,
}

// ==========================================
// SqliteTreeStore - SQLite 文档存储
// ==========================================
pub struct SqliteTreeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTreeStore {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（建表幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            ensure_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询文档元信息
    pub fn document_info(&self, document_id: &str) -> RepositoryResult<Option<StoredDocumentInfo>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT document_id, revision, saved_at FROM estimate_document WHERE document_id = ?1",
                params![document_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((document_id, revision, saved_at)) => {
                let saved_at = DateTime::parse_from_rfc3339(&saved_at)
                    .map_err(|e| RepositoryError::DatabaseQueryError(format!("saved_at 格式错误: {}", e)))?
                    .with_timezone(&Utc);
                Ok(Some(StoredDocumentInfo {
                    document_id,
                    revision,
                    saved_at,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn delete(&self, document_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM estimate_document WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(affected > 0)
    }
}

impl TreeStore for SqliteTreeStore {
    fn save_tree(&self, document_id: &str, root: &Item) -> RepositoryResult<i64> {
        let tree_json = serde_json::to_string(root)?;
        let conn = self.get_conn()?;
        let revision: i64 = conn.query_row(
            r#"
            INSERT INTO estimate_document (document_id, tree_json, revision, saved_at)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT(document_id) DO UPDATE SET
                tree_json = excluded.tree_json,
                revision = estimate_document.revision + 1,
                saved_at = excluded.saved_at
            RETURNING revision
            "#,
            params![document_id, tree_json, Utc::now().to_rfc3339()],
            |row| row.get(0),
        )?;
        tracing::debug!("条目树已保存: document_id={}, revision={}", document_id, revision);
        Ok(revision)
    }

    fn load_tree(&self, document_id: &str) -> RepositoryResult<Option<Item>> {
        let raw: Option<String> = {
            let conn = self.get_conn()?;
            conn.query_row(
                "SELECT tree_json FROM estimate_document WHERE document_id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .optional()?
        };

        match raw {
            Some(raw) => {
                let data: JsonValue = serde_json::from_str(&raw)?;
                Ok(Some(instantiate(data)?))
            }
            None => Ok(None),
        }
    }
}

// ==========================================
// MemoryTreeStore - 内存文档存储
// ==========================================
#[derive(Default)]
pub struct MemoryTreeStore {
    documents: Mutex<HashMap<String, (JsonValue, i64)>>,
    save_count: Mutex<usize>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计保存次数
    pub fn save_count(&self) -> usize {
        self.save_count.lock().map(|c| *c).unwrap_or(0)
    }

    /// 最近一次保存的原始记录
    pub fn raw(&self, document_id: &str) -> Option<JsonValue> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(document_id).map(|(json, _)| json.clone()))
    }
}

impl TreeStore for MemoryTreeStore {
    fn save_tree(&self, document_id: &str, root: &Item) -> RepositoryResult<i64> {
        let json = serde_json::to_value(root)?;
        let mut docs = self
            .documents
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let revision = docs.get(document_id).map(|(_, r)| r + 1).unwrap_or(1);
        docs.insert(document_id.to_string(), (json, revision));

        let mut count = self
            .save_count
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        *count += 1;
        Ok(revision)
    }

    fn load_tree(&self, document_id: &str) -> RepositoryResult<Option<Item>> {
        match self.raw(document_id) {
            Some(json) => Ok(Some(instantiate(json)?)),
            None => Ok(None),
        }
    }
}
