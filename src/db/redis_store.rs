//! Redis 文档存储
//!
//! 每个文档是一个 hash（`v` 版本号，`b` json 内容），每个集合维护一个
//! 按字典序排列的 zset 作为 key 索引。批量写入由一个 lua 脚本原子完成。
use crate::db::store::{Collection, DocumentStore, Precondition, StoredDoc, WriteOp};
use crate::error::store_error::StoreError;
use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::Script;

const KEY_NAMESPACE: &str = "hexrank";

// KEYS: n 个文档 key，后接 n 个索引 key
// ARGV: 每个写入 4 个参数 mode, expected_version, body, member
const COMMIT_SCRIPT: &str = r"
local n = #KEYS / 2
for i = 1, n do
    local mode = ARGV[(i - 1) * 4 + 1]
    local expected = ARGV[(i - 1) * 4 + 2]
    local current = redis.call('HGET', KEYS[i], 'v')
    if mode == 'absent' then
        if current then return 0 end
    elseif mode == 'version' then
        if (not current) or current ~= expected then return 0 end
    end
end
for i = 1, n do
    redis.call('HINCRBY', KEYS[i], 'v', 1)
    redis.call('HSET', KEYS[i], 'b', ARGV[(i - 1) * 4 + 3])
    redis.call('ZADD', KEYS[n + i], 0, ARGV[(i - 1) * 4 + 4])
end
return 1
";

pub struct RedisStore {
    redis_con_pool: Pool,
    commit_script: Script,
}

impl RedisStore {
    pub fn new(redis_con_pool: &Pool) -> Self {
        Self {
            redis_con_pool: redis_con_pool.clone(),
            commit_script: Script::new(COMMIT_SCRIPT),
        }
    }
}

/// 获取文档的 redis key
fn get_redis_doc_key(collection: Collection, key: &str) -> String {
    format!("{KEY_NAMESPACE}:doc:{}:{key}", collection.as_str())
}

/// 获取集合索引的 redis key
fn get_redis_index_key(collection: Collection) -> String {
    format!("{KEY_NAMESPACE}:idx:{}", collection.as_str())
}

/// ZRANGEBYLEX 的区间
fn lex_range(prefix: &str, after: Option<&str>) -> (Vec<u8>, Vec<u8>) {
    let min = match after {
        Some(after) => [b"(".as_slice(), after.as_bytes()].concat(),
        None if prefix.is_empty() => b"-".to_vec(),
        None => [b"[".as_slice(), prefix.as_bytes()].concat(),
    };
    let max = if prefix.is_empty() {
        b"+".to_vec()
    } else {
        [b"[".as_slice(), prefix.as_bytes(), &[0xff]].concat()
    };
    (min, max)
}

fn to_doc(key: String, version: Option<u64>, body: Option<String>) -> Result<Option<StoredDoc>, StoreError> {
    match (version, body) {
        (Some(version), Some(body)) => Ok(Some(StoredDoc {
            key,
            version,
            body: serde_json::from_str(&body)?,
        })),
        _ => Ok(None),
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredDoc>, StoreError> {
        let mut con = self.redis_con_pool.get().await?;
        let (version, body): (Option<u64>, Option<String>) = redis::cmd("HMGET")
            .arg(get_redis_doc_key(collection, key))
            .arg("v")
            .arg("b")
            .query_async(&mut con)
            .await?;
        to_doc(key.to_string(), version, body)
    }

    async fn list(
        &self,
        collection: Collection,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredDoc>, StoreError> {
        let mut con = self.redis_con_pool.get().await?;
        let (min, max) = lex_range(prefix, after);
        let keys: Vec<String> = redis::cmd("ZRANGEBYLEX")
            .arg(get_redis_index_key(collection))
            .arg(&min[..])
            .arg(&max[..])
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut con)
            .await?;
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let mut cmd_pipe = redis::pipe();
        for key in &keys {
            cmd_pipe
                .cmd("HMGET")
                .arg(get_redis_doc_key(collection, key))
                .arg("v")
                .arg("b");
        }
        let rows: Vec<(Option<u64>, Option<String>)> = cmd_pipe.query_async(&mut con).await?;

        let mut docs = Vec::with_capacity(keys.len());
        for (key, (version, body)) in keys.into_iter().zip(rows) {
            if let Some(doc) = to_doc(key, version, body)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut invocation = self.commit_script.prepare_invoke();
        for write in &writes {
            invocation.key(get_redis_doc_key(write.collection, &write.key));
        }
        for write in &writes {
            invocation.key(get_redis_index_key(write.collection));
        }
        for write in &writes {
            let (mode, expected) = match write.precondition {
                Precondition::Absent => ("absent", 0),
                Precondition::Version(version) => ("version", version),
                Precondition::Any => ("any", 0),
            };
            invocation
                .arg(mode)
                .arg(expected)
                .arg(write.body.to_string())
                .arg(&write.key);
        }

        let mut con = self.redis_con_pool.get().await?;
        let applied: i32 = invocation.invoke_async(&mut con).await?;
        if applied == 1 {
            Ok(())
        } else {
            Err(StoreError::Conflict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_range_covers_prefix() {
        let (min, max) = lex_range("2026-01-27:", None);
        assert_eq!(min, b"[2026-01-27:".to_vec());
        assert_eq!(max.last(), Some(&0xff));

        let (min, _) = lex_range("2026-01-27:", Some("2026-01-27:u1"));
        assert_eq!(min, b"(2026-01-27:u1".to_vec());

        let (min, max) = lex_range("", None);
        assert_eq!((min, max), (b"-".to_vec(), b"+".to_vec()));
    }

    #[test]
    fn redis_keys_are_namespaced() {
        assert_eq!(
            get_redis_doc_key(Collection::DailyChallenges, "2026-01-27"),
            "hexrank:doc:daily_challenges:2026-01-27"
        );
        assert_eq!(get_redis_index_key(Collection::Users), "hexrank:idx:users");
    }
}
