//! 成绩提交流程
//!
//! 校验 -> 限流 -> 读取当前最好成绩 -> 只有成绩提升才写入，
//! 一次提交的所有写入在同一个原子提交里完成，冲突时整体重试。
use crate::config::game_config::{GameConfig, RankMode};
use crate::db::store::Collection;
use crate::error::game_error::GameError;
use crate::error::store_error::StoreError;
use crate::model::daily::{format_date, parse_date, DailyChallengeEntry};
use crate::model::progress::{Attempt, LevelProgress};
use crate::model::rate_limit::Operation;
use crate::model::submission::{ScoreSubmission, SubmissionTarget};
use crate::model::user::{LeaderboardEntry, User};
use crate::repository::game_repository::{
    daily_entry_key, level_progress_key, precondition_of, put, GameRepository,
    GameRepositoryTrait,
};
use crate::service::rank_service::RankService;
use crate::service::rate_limiter::RateLimiter;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_STARS: i32 = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub improved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_rank: Option<u32>,
}

/// 关卡提交落库后的结果
struct LevelWrite {
    improved: bool,
    stars_changed: bool,
}

#[derive(Clone)]
pub struct ScoreService {
    repo: GameRepository,
    rate_limiter: RateLimiter,
    rank_service: RankService,
    config: Arc<GameConfig>,
}

impl ScoreService {
    pub fn new(
        repo: &GameRepository,
        rate_limiter: &RateLimiter,
        rank_service: &RankService,
        config: &Arc<GameConfig>,
    ) -> Self {
        Self {
            repo: repo.clone(),
            rate_limiter: rate_limiter.clone(),
            rank_service: rank_service.clone(),
            config: Arc::clone(config),
        }
    }

    pub async fn submit(&self, submission: ScoreSubmission) -> Result<SubmitOutcome, GameError> {
        let attempt = validate(&submission)?;

        let decision = self
            .rate_limiter
            .allow(
                &submission.user_id,
                Operation::Submit.as_str(),
                self.config.rules_for(Operation::Submit),
            )
            .await;
        if !decision.allowed {
            return Err(GameError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        let outcome = match &submission.target {
            SubmissionTarget::Level(level_id) => {
                self.submit_level(&submission, *level_id, attempt).await?
            }
            SubmissionTarget::Daily(raw_date) => {
                self.submit_daily(&submission, raw_date, attempt).await?
            }
        };

        tracing::info!(
            "score accepted - audit:{} | user:{} | target:{:?} | stars:{} | time_ms:{} | submitted_at:{} | improved:{}",
            Uuid::new_v4(),
            submission.user_id,
            submission.target,
            attempt.stars,
            attempt.time_ms,
            submission.submitted_at.to_rfc3339(),
            outcome.improved
        );
        Ok(outcome)
    }

    async fn submit_level(
        &self,
        submission: &ScoreSubmission,
        level_id: u32,
        attempt: Attempt,
    ) -> Result<SubmitOutcome, GameError> {
        if level_id == 0 || level_id > self.config.max_level_id {
            return Err(GameError::NotFound(format!("level {level_id}")));
        }

        let write = self.write_level(submission, level_id, attempt).await?;
        if !write.improved {
            return Ok(SubmitOutcome {
                accepted: true,
                ..Default::default()
            });
        }

        let mut new_rank = None;
        if write.stars_changed && self.config.rank_mode == RankMode::Incremental {
            // 排名只是投影，重算失败不影响已经落库的成绩
            if let Err(err) = self.rank_service.recompute_global_ranks().await {
                tracing::warn!(
                    "submit_level recompute failed - user:{} | error:{}",
                    submission.user_id,
                    err
                );
            }
            new_rank = self
                .repo
                .get_leaderboard_entry(&submission.user_id)
                .await?
                .map(|entry| entry.value.rank)
                .filter(|rank| *rank > 0);
        }
        Ok(SubmitOutcome {
            accepted: true,
            improved: true,
            new_rank,
        })
    }

    async fn write_level(
        &self,
        submission: &ScoreSubmission,
        level_id: u32,
        attempt: Attempt,
    ) -> Result<LevelWrite, GameError> {
        let progress_key = level_progress_key(&submission.user_id, level_id);
        for _ in 0..=self.config.store_max_retries {
            let progress = self
                .repo
                .get_level_progress(&submission.user_id, level_id)
                .await?;
            let previous = progress.as_ref().map(|doc| doc.value.best());
            if let Some(best) = &previous {
                if !attempt.improves_on(best) {
                    return Ok(LevelWrite {
                        improved: false,
                        stars_changed: false,
                    });
                }
            }

            let current_user = self.repo.get_user(&submission.user_id).await?;
            let current_entry = self
                .repo
                .get_leaderboard_entry(&submission.user_id)
                .await?;

            // 星数只增不减
            let previous_stars = previous.map(|best| best.stars).unwrap_or(0);
            let delta = u32::from(attempt.stars.saturating_sub(previous_stars));

            let mut user = current_user
                .as_ref()
                .map(|doc| doc.value.clone())
                .unwrap_or_else(|| {
                    User::new(
                        &submission.user_id,
                        &submission.display_name,
                        submission.avatar_ref.clone(),
                        submission.submitted_at,
                    )
                });
            user.total_stars += delta;

            let mut entry = LeaderboardEntry::from_user(&user);
            if let Some(existing) = &current_entry {
                entry.rank = existing.value.rank;
            }

            let next = LevelProgress {
                user_id: submission.user_id.clone(),
                level_id,
                stars: attempt.stars,
                best_time_ms: attempt.time_ms,
                updated_at: submission.submitted_at,
            };

            let mut writes = vec![put(
                Collection::LevelProgress,
                progress_key.as_str(),
                &next,
                precondition_of(progress.as_ref()),
            )?];
            let created = current_user.is_none() || current_entry.is_none();
            if delta > 0 || current_user.is_none() {
                writes.push(put(
                    Collection::Users,
                    user.id.as_str(),
                    &user,
                    precondition_of(current_user.as_ref()),
                )?);
            }
            if delta > 0 || current_entry.is_none() {
                writes.push(put(
                    Collection::Leaderboard,
                    user.id.as_str(),
                    &entry,
                    precondition_of(current_entry.as_ref()),
                )?);
            }

            match self.repo.commit(writes).await {
                Ok(()) => {
                    return Ok(LevelWrite {
                        improved: true,
                        stars_changed: delta > 0 || created,
                    })
                }
                Err(StoreError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        tracing::warn!(
            "write_level retries exhausted - user:{} | level:{}",
            submission.user_id,
            level_id
        );
        Err(GameError::StorageConflict)
    }

    async fn submit_daily(
        &self,
        submission: &ScoreSubmission,
        raw_date: &str,
        attempt: Attempt,
    ) -> Result<SubmitOutcome, GameError> {
        let date = parse_date(raw_date)
            .map(format_date)
            .ok_or_else(|| GameError::NotFound(format!("daily challenge {raw_date}")))?;

        let improved = self.write_daily(submission, &date, attempt).await?;
        if !improved {
            return Ok(SubmitOutcome {
                accepted: true,
                ..Default::default()
            });
        }

        let mut new_rank = None;
        if self.config.rank_mode == RankMode::Incremental {
            if let Err(err) = self.rank_service.recompute_daily_ranks(&date).await {
                tracing::warn!(
                    "submit_daily recompute failed - date:{} | error:{}",
                    date,
                    err
                );
            }
            new_rank = self
                .repo
                .get_daily_entry(&date, &submission.user_id)
                .await?
                .map(|entry| entry.value.rank)
                .filter(|rank| *rank > 0);
        }
        Ok(SubmitOutcome {
            accepted: true,
            improved: true,
            new_rank,
        })
    }

    async fn write_daily(
        &self,
        submission: &ScoreSubmission,
        date: &str,
        attempt: Attempt,
    ) -> Result<bool, GameError> {
        let entry_key = daily_entry_key(date, &submission.user_id);
        for _ in 0..=self.config.store_max_retries {
            let challenge = self
                .repo
                .get_daily_challenge(date)
                .await?
                .filter(|doc| doc.value.is_ready())
                .ok_or_else(|| GameError::NotFound(format!("daily challenge {date}")))?;

            let current = self.repo.get_daily_entry(date, &submission.user_id).await?;
            if let Some(existing) = &current {
                let best = Attempt {
                    stars: existing.value.stars,
                    time_ms: existing.value.completion_time_ms,
                };
                if !attempt.improves_on(&best) {
                    return Ok(false);
                }
            }

            let total_stars = self
                .repo
                .get_user(&submission.user_id)
                .await?
                .map(|doc| doc.value.total_stars)
                .unwrap_or(0);

            let entry = DailyChallengeEntry {
                date: date.to_string(),
                user_id: submission.user_id.clone(),
                display_name: submission.display_name.clone(),
                stars: attempt.stars,
                completion_time_ms: attempt.time_ms,
                total_stars_snapshot: total_stars,
                completed_at: submission.submitted_at,
                rank: current.as_ref().map(|doc| doc.value.rank).unwrap_or(0),
            };
            let mut next_challenge = challenge.value.clone();
            next_challenge.completion_count += 1;

            let writes = vec![
                put(
                    Collection::DailyChallenges,
                    date,
                    &next_challenge,
                    challenge.precondition(),
                )?,
                put(
                    Collection::DailyEntries,
                    entry_key.as_str(),
                    &entry,
                    precondition_of(current.as_ref()),
                )?,
            ];
            match self.repo.commit(writes).await {
                Ok(()) => return Ok(true),
                Err(StoreError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        tracing::warn!(
            "write_daily retries exhausted - user:{} | date:{}",
            submission.user_id,
            date
        );
        Err(GameError::StorageConflict)
    }
}

/// 任何 I/O 之前先校验
fn validate(submission: &ScoreSubmission) -> Result<Attempt, GameError> {
    if !(0..=MAX_STARS).contains(&submission.stars) {
        return Err(GameError::InvalidInput(format!(
            "stars must be between 0 and {MAX_STARS}"
        )));
    }
    if submission.time_ms <= 0 {
        return Err(GameError::InvalidInput(
            "timeMs must be positive".to_string(),
        ));
    }
    Ok(Attempt {
        stars: submission.stars as u8,
        time_ms: submission.time_ms as u64,
    })
}
