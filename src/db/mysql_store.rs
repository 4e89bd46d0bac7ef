//! MySQL 文档存储
//!
//! 所有集合存放在同一张 `documents` 表，`(collection, doc_key)` 为主键，
//! `version` 列用于乐观并发控制。
use crate::db::database::{Database, DatabaseTrait};
use crate::db::store::{Collection, DocumentStore, Precondition, StoredDoc, WriteOp};
use crate::error::store_error::StoreError;
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::Row;
use std::sync::Arc;

const CREATE_DOCUMENTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection VARCHAR(32) NOT NULL,
    doc_key VARCHAR(191) NOT NULL,
    version BIGINT UNSIGNED NOT NULL,
    body JSON NOT NULL,
    PRIMARY KEY (collection, doc_key)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

pub struct MySqlStore {
    db_conn: Arc<Database>,
}

impl MySqlStore {
    pub fn new(db_conn: &Arc<Database>) -> Self {
        Self {
            db_conn: Arc::clone(db_conn),
        }
    }

    /// 建表
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(CREATE_DOCUMENTS_TABLE)
            .execute(self.db_conn.get_master_pool())
            .await?;
        Ok(())
    }
}

fn row_to_doc(row: &MySqlRow) -> Result<StoredDoc, StoreError> {
    let key: String = row.try_get("doc_key")?;
    let version: u64 = row.try_get("version")?;
    let body: String = row.try_get("body")?;
    Ok(StoredDoc {
        key,
        version,
        body: serde_json::from_str(&body)?,
    })
}

/// LIKE 前缀匹配时转义通配符
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl DocumentStore for MySqlStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredDoc>, StoreError> {
        let row = sqlx::query(
            "SELECT doc_key, version, CAST(body AS CHAR) AS body FROM documents WHERE collection = ? AND doc_key = ?",
        )
        .bind(collection.as_str())
        .bind(key)
        .fetch_optional(self.db_conn.get_master_pool())
        .await?;
        row.as_ref().map(row_to_doc).transpose()
    }

    async fn list(
        &self,
        collection: Collection,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredDoc>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc_key, version, CAST(body AS CHAR) AS body FROM documents
            WHERE collection = ? AND doc_key LIKE ? AND doc_key > ?
            ORDER BY doc_key LIMIT ?",
        )
        .bind(collection.as_str())
        .bind(like_prefix(prefix))
        .bind(after.unwrap_or(""))
        .bind(limit as u64)
        .fetch_all(self.db_conn.get_slave_pool())
        .await?;
        rows.iter().map(row_to_doc).collect()
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut tx = self.db_conn.get_master_pool().begin().await?;
        for write in &writes {
            let body = write.body.to_string();
            let result = match write.precondition {
                Precondition::Absent => {
                    sqlx::query(
                        "INSERT INTO documents (collection, doc_key, version, body) VALUES (?, ?, 1, ?)",
                    )
                    .bind(write.collection.as_str())
                    .bind(&write.key)
                    .bind(&body)
                    .execute(&mut *tx)
                    .await
                }
                Precondition::Version(expected) => {
                    sqlx::query(
                        "UPDATE documents SET version = version + 1, body = ?
                        WHERE collection = ? AND doc_key = ? AND version = ?",
                    )
                    .bind(&body)
                    .bind(write.collection.as_str())
                    .bind(&write.key)
                    .bind(expected)
                    .execute(&mut *tx)
                    .await
                }
                Precondition::Any => {
                    sqlx::query(
                        "INSERT INTO documents (collection, doc_key, version, body) VALUES (?, ?, 1, ?)
                        ON DUPLICATE KEY UPDATE version = version + 1, body = VALUES(body)",
                    )
                    .bind(write.collection.as_str())
                    .bind(&write.key)
                    .bind(&body)
                    .execute(&mut *tx)
                    .await
                }
            };
            let failed = match result {
                Ok(done) => done.rows_affected() == 0,
                Err(err) => {
                    let err = StoreError::from(err);
                    if !err.is_conflict() {
                        tracing::error!(
                            "mysql commit - collection:{} | key:{} | err:{}",
                            write.collection,
                            write.key,
                            err
                        );
                    }
                    tx.rollback().await?;
                    return Err(err);
                }
            };
            if failed {
                tx.rollback().await?;
                return Err(StoreError::Conflict);
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
