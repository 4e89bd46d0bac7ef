//! 排名计算
//!
//! 排名只是从 totalStars / stars 推导出来的投影，随时可以整体重算，
//! 部分批次写失败时由下一次计算自动修正。
use crate::config::game_config::GameConfig;
use crate::db::store::Collection;
use crate::error::store_error::StoreError;
use crate::model::daily::{daily_order, format_date, DailyChallengeEntry};
use crate::model::event::GameEvent;
use crate::model::rank_cursor::RankCursor;
use crate::model::user::{global_order, LeaderboardEntry};
use crate::repository::game_repository::{
    daily_entry_prefix, put, GameRepository, GameRepositoryTrait, Ranked, Versioned,
};
use crate::db::store::Precondition;
use crate::service::event_bus::EventBus;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Duration;
use tokio::time::Instant;

/// 全局批量排名任务的游标 key
pub const GLOBAL_RANK_JOB: &str = "global_rank_batch";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeReport {
    pub total: usize,
    pub written: usize,
    pub complete: bool,
    /// 未完成时下一次从这里继续
    pub next_offset: usize,
    /// 批量任务顺带写入的每日榜排名数
    pub daily_written: usize,
}

/// (userId, 旧排名, 新排名)
type RankChange = (String, u32, u32);

#[derive(Clone)]
pub struct RankService {
    repo: GameRepository,
    events: EventBus,
    write_batch: usize,
    max_retries: u32,
    batch_deadline: Duration,
}

impl RankService {
    pub fn new(repo: &GameRepository, events: &EventBus, config: &GameConfig) -> Self {
        Self {
            repo: repo.clone(),
            events: events.clone(),
            write_batch: config.rank_write_batch.max(1),
            max_retries: config.store_max_retries,
            batch_deadline: config.rank_batch_deadline,
        }
    }

    /// 全量重算全局排名
    pub async fn recompute_global_ranks(&self) -> Result<RecomputeReport, StoreError> {
        self.apply_ranks::<LeaderboardEntry>("", global_order, 0, None)
            .await
    }

    /// 重算某天每日挑战的排名
    pub async fn recompute_daily_ranks(&self, date: &str) -> Result<RecomputeReport, StoreError> {
        self.apply_ranks::<DailyChallengeEntry>(&daily_entry_prefix(date), daily_order, 0, None)
            .await
    }

    /// 计划任务调用，有时间上限，超时保存游标下次继续
    pub async fn run_scheduled_batch(&self) -> Result<RecomputeReport, StoreError> {
        self.run_scheduled_batch_at(Utc::now().date_naive()).await
    }

    /// 全局榜之后顺带重算当天和前一天的每日榜，跨零点提交的成绩也能排上
    pub async fn run_scheduled_batch_at(&self, today: NaiveDate) -> Result<RecomputeReport, StoreError> {
        let deadline = Instant::now() + self.batch_deadline;
        let cursor = self.repo.get_rank_cursor(GLOBAL_RANK_JOB).await?;
        let offset = cursor.as_ref().map(|c| c.value.offset).unwrap_or(0);
        let mut report = self
            .apply_ranks::<LeaderboardEntry>("", global_order, offset, Some(deadline))
            .await?;

        let next_offset = if report.complete { 0 } else { report.next_offset };
        let cursor_offset = cursor.as_ref().map(|c| c.value.offset);
        if cursor_offset.unwrap_or(0) != next_offset {
            let cursor = RankCursor {
                offset: next_offset,
                updated_at: Utc::now(),
            };
            self.repo
                .commit(vec![put(
                    Collection::Jobs,
                    GLOBAL_RANK_JOB,
                    &cursor,
                    Precondition::Any,
                )?])
                .await?;
        }
        if report.complete {
            tracing::info!(
                "rank batch complete - total:{} | written:{}",
                report.total,
                report.written
            );
        } else {
            tracing::warn!(
                "rank batch hit deadline - total:{} | written:{} | resume_at:{}",
                report.total,
                report.written,
                report.next_offset
            );
        }

        let days = [Some(today), today.pred_opt()];
        for date in days.into_iter().flatten().map(format_date) {
            match self.recompute_daily_ranks(&date).await {
                Ok(daily) => report.daily_written += daily.written,
                Err(err) => {
                    tracing::error!("rank batch daily - date:{} | error:{}", date, err);
                }
            }
        }
        Ok(report)
    }

    /// 按排名读取全局榜前 limit 名
    pub async fn top_entries(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let rows = self
            .repo
            .list_all::<LeaderboardEntry>(Collection::Leaderboard, "")
            .await?;
        Ok(top_by_rank(rows, limit))
    }

    /// 按排名读取每日挑战前 limit 名
    pub async fn daily_top_entries(
        &self,
        date: &str,
        limit: usize,
    ) -> Result<Vec<DailyChallengeEntry>, StoreError> {
        let rows = self
            .repo
            .list_all::<DailyChallengeEntry>(Collection::DailyEntries, &daily_entry_prefix(date))
            .await?;
        Ok(top_by_rank(rows, limit))
    }

    /// 读取、排序、分批写回；任何一批版本冲突都说明快照已过期，
    /// 整体重新读取排序后再来，绝不写回旧快照算出的排名
    async fn apply_ranks<T: Ranked>(
        &self,
        prefix: &str,
        order: fn(&T, &T) -> Ordering,
        start: usize,
        deadline: Option<Instant>,
    ) -> Result<RecomputeReport, StoreError> {
        let mut written = 0;
        for attempt in 0..=self.max_retries {
            let mut rows = self.repo.list_all::<T>(T::COLLECTION, prefix).await?;
            rows.sort_by(|a, b| order(&a.value, &b.value));
            match self.write_ranks(rows, start, deadline, &mut written).await {
                Ok(report) => return Ok(report),
                Err(StoreError::Conflict) => {
                    tracing::debug!(
                        "rank snapshot stale, rereading - collection:{} | prefix:{} | attempt:{}",
                        T::COLLECTION,
                        prefix,
                        attempt
                    );
                }
                Err(err) => return Err(err),
            }
        }
        tracing::error!(
            "rank recompute abandoned after retries - collection:{} | prefix:{} | written:{}",
            T::COLLECTION,
            prefix,
            written
        );
        Err(StoreError::Conflict)
    }

    async fn write_ranks<T: Ranked>(
        &self,
        sorted: Vec<Versioned<T>>,
        start: usize,
        deadline: Option<Instant>,
        written: &mut usize,
    ) -> Result<RecomputeReport, StoreError> {
        let total = sorted.len();
        let assignments: Vec<(Versioned<T>, u32)> = sorted
            .into_iter()
            .enumerate()
            .map(|(idx, row)| (row, (idx + 1) as u32))
            .collect();

        // 游标越界说明集合变小了，从头开始
        let mut offset = if start >= total { 0 } else { start };
        while offset < total {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(RecomputeReport {
                        total,
                        written: *written,
                        complete: false,
                        next_offset: offset,
                        daily_written: 0,
                    });
                }
            }
            let end = (offset + self.write_batch).min(total);
            // 排名没变的不重写
            let chunk: Vec<&(Versioned<T>, u32)> = assignments[offset..end]
                .iter()
                .filter(|(row, rank)| row.value.rank() != *rank)
                .collect();
            if !chunk.is_empty() {
                let changes = self.write_chunk(&chunk).await?;
                *written += changes.len();
                if T::COLLECTION == Collection::Leaderboard {
                    self.publish_rank_changes(changes);
                }
            }
            offset = end;
        }

        Ok(RecomputeReport {
            total,
            written: *written,
            complete: true,
            next_offset: total,
            daily_written: 0,
        })
    }

    /// 一个批次一次提交，冲突原样返回
    async fn write_chunk<T: Ranked>(
        &self,
        chunk: &[&(Versioned<T>, u32)],
    ) -> Result<Vec<RankChange>, StoreError> {
        let writes = chunk
            .iter()
            .map(|(row, rank)| {
                let mut value = row.value.clone();
                value.set_rank(*rank);
                put(T::COLLECTION, value.doc_key(), &value, row.precondition())
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.repo.commit(writes).await?;
        Ok(chunk
            .iter()
            .map(|(row, rank)| (row.value.user_id().to_string(), row.value.rank(), *rank))
            .collect())
    }

    fn publish_rank_changes(&self, changes: Vec<RankChange>) {
        for (user_id, old_rank, new_rank) in changes {
            // 第一次上榜不算排名变化
            if old_rank == 0 || old_rank == new_rank {
                continue;
            }
            self.events.publish(GameEvent::RankChanged {
                user_id,
                old_rank,
                new_rank,
            });
        }
    }
}

fn top_by_rank<T: Ranked>(rows: Vec<Versioned<T>>, limit: usize) -> Vec<T> {
    let mut ranked: Vec<T> = rows
        .into_iter()
        .map(|row| row.value)
        .filter(|value| value.rank() > 0)
        .collect();
    ranked.sort_by_key(|value| value.rank());
    ranked.truncate(limit);
    ranked
}
