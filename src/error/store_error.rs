use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// 写入前置条件不满足（文档已存在 / 版本已变化），整批写入未生效
    #[error("write precondition failed")]
    Conflict,
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("document decode failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                // 主键冲突 / 死锁 都按乐观并发冲突处理
                if db_err.is_unique_violation() || db_err.code().as_deref() == Some("40001") {
                    StoreError::Conflict
                } else {
                    StoreError::Backend(err.to_string())
                }
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}
