//! 业务集合的类型化读写
use crate::db::store::{Collection, Precondition, SharedStore, StoredDoc, WriteOp};
use crate::error::store_error::StoreError;
use crate::model::daily::{DailyChallenge, DailyChallengeEntry};
use crate::model::progress::LevelProgress;
use crate::model::rank_cursor::RankCursor;
use crate::model::rate_limit::RateLimitWindow;
use crate::model::user::{LeaderboardEntry, User};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// 分页读取的页大小
pub const PAGE_SIZE: usize = 500;

/// 读出的文档和它的版本号
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn precondition(&self) -> Precondition {
        Precondition::Version(self.version)
    }
}

/// 现有文档按版本覆盖，没有则新建
pub fn precondition_of<T>(current: Option<&Versioned<T>>) -> Precondition {
    current
        .map(Versioned::precondition)
        .unwrap_or(Precondition::Absent)
}

/// 构造一条写入
pub fn put<T: Serialize>(
    collection: Collection,
    key: impl Into<String>,
    value: &T,
    precondition: Precondition,
) -> Result<WriteOp, StoreError> {
    Ok(WriteOp {
        collection,
        key: key.into(),
        body: serde_json::to_value(value)?,
        precondition,
    })
}

fn decode<T: DeserializeOwned>(doc: StoredDoc) -> Result<Versioned<T>, StoreError> {
    Ok(Versioned {
        value: serde_json::from_value(doc.body)?,
        version: doc.version,
    })
}

pub fn level_progress_key(user_id: &str, level_id: u32) -> String {
    format!("{user_id}:{level_id}")
}

pub fn daily_entry_prefix(date: &str) -> String {
    format!("{date}:")
}

pub fn daily_entry_key(date: &str, user_id: &str) -> String {
    format!("{date}:{user_id}")
}

pub fn rate_limit_key(operation: &str, caller_key: &str) -> String {
    format!("{operation}:{caller_key}")
}

/// 需要排名的文档
pub trait Ranked: Clone + Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
    fn doc_key(&self) -> String;
    fn user_id(&self) -> &str;
    fn rank(&self) -> u32;
    fn set_rank(&mut self, rank: u32);
}

impl Ranked for LeaderboardEntry {
    const COLLECTION: Collection = Collection::Leaderboard;

    fn doc_key(&self) -> String {
        self.user_id.clone()
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn set_rank(&mut self, rank: u32) {
        self.rank = rank;
    }
}

impl Ranked for DailyChallengeEntry {
    const COLLECTION: Collection = Collection::DailyEntries;

    fn doc_key(&self) -> String {
        daily_entry_key(&self.date, &self.user_id)
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn set_rank(&mut self, rank: u32) {
        self.rank = rank;
    }
}

#[derive(Clone)]
pub struct GameRepository {
    store: SharedStore,
}

#[async_trait]
pub trait GameRepositoryTrait {
    fn new(store: &SharedStore) -> Self;

    /// 读取任意类型文档
    async fn get_doc<T: DeserializeOwned + Send>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Versioned<T>>, StoreError>;

    /// 读取某个前缀下的全部文档
    async fn list_all<T: DeserializeOwned + Send>(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<Versioned<T>>, StoreError>;

    /// 原子提交
    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<Versioned<User>>, StoreError>;

    async fn get_leaderboard_entry(
        &self,
        user_id: &str,
    ) -> Result<Option<Versioned<LeaderboardEntry>>, StoreError>;

    async fn get_level_progress(
        &self,
        user_id: &str,
        level_id: u32,
    ) -> Result<Option<Versioned<LevelProgress>>, StoreError>;

    async fn get_daily_challenge(
        &self,
        date: &str,
    ) -> Result<Option<Versioned<DailyChallenge>>, StoreError>;

    async fn get_daily_entry(
        &self,
        date: &str,
        user_id: &str,
    ) -> Result<Option<Versioned<DailyChallengeEntry>>, StoreError>;

    async fn get_rate_window(
        &self,
        operation: &str,
        caller_key: &str,
    ) -> Result<Option<Versioned<RateLimitWindow>>, StoreError>;

    async fn get_rank_cursor(&self, job: &str) -> Result<Option<Versioned<RankCursor>>, StoreError>;
}

#[async_trait]
impl GameRepositoryTrait for GameRepository {
    fn new(store: &SharedStore) -> Self {
        Self {
            store: Arc::clone(store),
        }
    }

    async fn get_doc<T: DeserializeOwned + Send>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Versioned<T>>, StoreError> {
        match self.store.get(collection, key).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    async fn list_all<T: DeserializeOwned + Send>(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<Versioned<T>>, StoreError> {
        let mut all = vec![];
        let mut after: Option<String> = None;
        loop {
            let page = self
                .store
                .list(collection, prefix, after.as_deref(), PAGE_SIZE)
                .await?;
            let page_len = page.len();
            after = page.last().map(|doc| doc.key.clone());
            for doc in page {
                all.push(decode(doc)?);
            }
            if page_len < PAGE_SIZE {
                break;
            }
        }
        Ok(all)
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        self.store.commit(writes).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<Versioned<User>>, StoreError> {
        self.get_doc(Collection::Users, user_id).await
    }

    async fn get_leaderboard_entry(
        &self,
        user_id: &str,
    ) -> Result<Option<Versioned<LeaderboardEntry>>, StoreError> {
        self.get_doc(Collection::Leaderboard, user_id).await
    }

    async fn get_level_progress(
        &self,
        user_id: &str,
        level_id: u32,
    ) -> Result<Option<Versioned<LevelProgress>>, StoreError> {
        self.get_doc(
            Collection::LevelProgress,
            &level_progress_key(user_id, level_id),
        )
        .await
    }

    async fn get_daily_challenge(
        &self,
        date: &str,
    ) -> Result<Option<Versioned<DailyChallenge>>, StoreError> {
        self.get_doc(Collection::DailyChallenges, date).await
    }

    async fn get_daily_entry(
        &self,
        date: &str,
        user_id: &str,
    ) -> Result<Option<Versioned<DailyChallengeEntry>>, StoreError> {
        self.get_doc(Collection::DailyEntries, &daily_entry_key(date, user_id))
            .await
    }

    async fn get_rate_window(
        &self,
        operation: &str,
        caller_key: &str,
    ) -> Result<Option<Versioned<RateLimitWindow>>, StoreError> {
        self.get_doc(
            Collection::RateLimits,
            &rate_limit_key(operation, caller_key),
        )
        .await
    }

    async fn get_rank_cursor(&self, job: &str) -> Result<Option<Versioned<RankCursor>>, StoreError> {
        self.get_doc(Collection::Jobs, job).await
    }
}
