//! 进程内存储，本地运行和测试使用
use crate::db::store::{Collection, DocumentStore, Precondition, StoredDoc, WriteOp};
use crate::error::store_error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<(Collection, String), (u64, Value)>>,
    commits: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 成功提交的次数
    #[cfg(test)]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredDoc>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs
            .get(&(collection, key.to_string()))
            .map(|(version, body)| StoredDoc {
                key: key.to_string(),
                version: *version,
                body: body.clone(),
            }))
    }

    async fn list(
        &self,
        collection: Collection,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredDoc>, StoreError> {
        let docs = self.docs.read().await;
        let lower = match after {
            Some(after) => Bound::Excluded((collection, after.to_string())),
            None => Bound::Included((collection, prefix.to_string())),
        };
        Ok(docs
            .range((lower, Bound::Unbounded))
            .take_while(|((c, _), _)| *c == collection)
            .filter(|((_, key), _)| key.starts_with(prefix))
            .take(limit)
            .map(|((_, key), (version, body))| StoredDoc {
                key: key.clone(),
                version: *version,
                body: body.clone(),
            })
            .collect())
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        for write in &writes {
            let current = docs
                .get(&(write.collection, write.key.clone()))
                .map(|(version, _)| *version);
            let satisfied = match (write.precondition, current) {
                (Precondition::Any, _) => true,
                (Precondition::Absent, current) => current.is_none(),
                (Precondition::Version(expected), Some(version)) => expected == version,
                (Precondition::Version(_), None) => false,
            };
            if !satisfied {
                return Err(StoreError::Conflict);
            }
        }
        for write in writes {
            let slot = docs
                .entry((write.collection, write.key))
                .or_insert((0, Value::Null));
            slot.0 += 1;
            slot.1 = write.body;
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
