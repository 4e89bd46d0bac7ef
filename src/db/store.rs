//! 文档存储抽象
//!
//! 所有需要多方并发修改的字段都通过 `commit` 的前置条件做乐观并发控制，
//! 任意一条前置条件不满足时整批写入都不生效。
use crate::error::store_error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    LevelProgress,
    Leaderboard,
    DailyChallenges,
    DailyEntries,
    RateLimits,
    Jobs,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::LevelProgress => "level_progress",
            Collection::Leaderboard => "leaderboard",
            Collection::DailyChallenges => "daily_challenges",
            Collection::DailyEntries => "daily_entries",
            Collection::RateLimits => "rate_limits",
            Collection::Jobs => "jobs",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 带版本号的文档，新建文档版本为 1，每次写入加 1
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDoc {
    pub key: String,
    pub version: u64,
    pub body: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// 只能新建
    Absent,
    /// 当前版本必须等于给定值
    Version(u64),
    /// 无条件覆盖
    Any,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteOp {
    pub collection: Collection,
    pub key: String,
    pub body: Value,
    pub precondition: Precondition,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 读取单个文档
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredDoc>, StoreError>;

    /// 按 key 字典序分页读取，`after` 为上一页最后一个 key
    async fn list(
        &self,
        collection: Collection,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredDoc>, StoreError>;

    /// 原子提交一批写入
    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn DocumentStore>;
