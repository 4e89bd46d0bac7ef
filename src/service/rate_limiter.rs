//! 滑动窗口日志限流
//!
//! 每个 (操作, 调用方) 一个窗口文档，检查和追加在同一次带版本前置条件的提交里完成，
//! 同一调用方的并发请求只有一个能写入成功，其余重新读取后再判断。
use crate::db::store::Collection;
use crate::error::store_error::StoreError;
use crate::model::rate_limit::{RateLimitWindow, RateRule};
use crate::repository::game_repository::{
    precondition_of, put, rate_limit_key, GameRepository, GameRepositoryTrait,
};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 存储不可用时返回给调用方的重试间隔
const FAIL_CLOSED_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after: Duration,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    fn reject(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }
}

/// 裁剪过期时间戳并判断能否再放行一次，放行时追加 `now_ms`
pub fn evaluate_window(timestamps: &mut Vec<i64>, rules: &[RateRule], now_ms: i64) -> RateDecision {
    let longest_ms = rules
        .iter()
        .map(|rule| rule.window.as_millis() as i64)
        .max()
        .unwrap_or(0);
    timestamps.retain(|ts| *ts > now_ms - longest_ms);
    timestamps.sort_unstable();

    let mut retry_after_ms: Option<i64> = None;
    for rule in rules {
        let window_ms = rule.window.as_millis() as i64;
        let in_window: Vec<i64> = timestamps
            .iter()
            .copied()
            .filter(|ts| *ts > now_ms - window_ms)
            .collect();
        let limit = rule.limit as usize;
        if in_window.len() >= limit {
            // 最早一条过期后才会腾出名额
            let oldest = in_window[in_window.len() - limit];
            let wait = oldest + window_ms - now_ms;
            retry_after_ms = Some(retry_after_ms.map_or(wait, |cur| cur.max(wait)));
        }
    }
    if let Some(wait) = retry_after_ms {
        return RateDecision::reject(Duration::from_millis(wait.max(0) as u64));
    }

    timestamps.push(now_ms);
    let cap = rules.iter().map(|rule| rule.limit as usize).max().unwrap_or(0);
    if timestamps.len() > cap {
        let overflow = timestamps.len() - cap;
        timestamps.drain(..overflow);
    }
    RateDecision::allow()
}

#[derive(Clone)]
pub struct RateLimiter {
    repo: GameRepository,
    max_retries: u32,
}

impl RateLimiter {
    pub fn new(repo: &GameRepository, max_retries: u32) -> Self {
        Self {
            repo: repo.clone(),
            max_retries,
        }
    }

    pub async fn allow(&self, caller_key: &str, operation: &str, rules: &[RateRule]) -> RateDecision {
        self.allow_at(caller_key, operation, rules, Utc::now()).await
    }

    /// 存储出错时按被限流处理
    pub async fn allow_at(
        &self,
        caller_key: &str,
        operation: &str,
        rules: &[RateRule],
        now: DateTime<Utc>,
    ) -> RateDecision {
        match self.try_allow(caller_key, operation, rules, now).await {
            Ok(decision) => {
                if !decision.allowed {
                    tracing::debug!(
                        "rate limited - operation:{} | caller:{} | retry_after_ms:{}",
                        operation,
                        caller_key,
                        decision.retry_after.as_millis()
                    );
                }
                decision
            }
            Err(err) => {
                tracing::warn!(
                    "rate limiter failing closed - operation:{} | caller:{} | err:{}",
                    operation,
                    caller_key,
                    err
                );
                RateDecision::reject(FAIL_CLOSED_RETRY_AFTER)
            }
        }
    }

    async fn try_allow(
        &self,
        caller_key: &str,
        operation: &str,
        rules: &[RateRule],
        now: DateTime<Utc>,
    ) -> Result<RateDecision, StoreError> {
        // 没有配置规则即不限流，也不落窗口
        if rules.is_empty() {
            return Ok(RateDecision::allow());
        }
        let now_ms = now.timestamp_millis();
        for _ in 0..=self.max_retries {
            let current = self.repo.get_rate_window(operation, caller_key).await?;
            let mut window = current
                .as_ref()
                .map(|doc| doc.value.clone())
                .unwrap_or_else(|| RateLimitWindow {
                    caller_key: caller_key.to_string(),
                    operation: operation.to_string(),
                    timestamps: vec![],
                });

            let decision = evaluate_window(&mut window.timestamps, rules, now_ms);
            if !decision.allowed {
                return Ok(decision);
            }
            let write = put(
                Collection::RateLimits,
                rate_limit_key(operation, caller_key),
                &window,
                precondition_of(current.as_ref()),
            )?;
            match self.repo.commit(vec![write]).await {
                Ok(()) => return Ok(decision),
                Err(StoreError::Conflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::store::SharedStore;
    use std::sync::Arc;

    fn limiter() -> RateLimiter {
        let store: SharedStore = Arc::new(MemoryStore::new());
        RateLimiter::new(&GameRepository::new(&store), 5)
    }

    fn rule(limit: u32, secs: u64) -> RateRule {
        RateRule::new(limit, Duration::from_secs(secs))
    }

    #[test]
    fn window_rejects_at_limit_and_reports_retry_after() {
        let rules = [rule(2, 10)];
        let mut log = vec![];
        assert!(evaluate_window(&mut log, &rules, 1_000).allowed);
        assert!(evaluate_window(&mut log, &rules, 4_000).allowed);

        let rejected = evaluate_window(&mut log, &rules, 5_000);
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after, Duration::from_millis(6_000));
        assert_eq!(log, vec![1_000, 4_000]);

        // 第一条过期后放行
        assert!(evaluate_window(&mut log, &rules, 11_001).allowed);
        assert_eq!(log, vec![4_000, 11_001]);
    }

    #[test]
    fn window_applies_every_rule() {
        let rules = [rule(10, 60), rule(1, 1)];
        let mut log = vec![];
        assert!(evaluate_window(&mut log, &rules, 0).allowed);

        let burst = evaluate_window(&mut log, &rules, 200);
        assert!(!burst.allowed);
        assert_eq!(burst.retry_after, Duration::from_millis(800));

        for i in 1..10 {
            assert!(evaluate_window(&mut log, &rules, i * 1_500).allowed);
        }
        let minute = evaluate_window(&mut log, &rules, 20_000);
        assert!(!minute.allowed);
        assert_eq!(minute.retry_after, Duration::from_millis(40_000));
        assert_eq!(log.len(), 10);
    }

    #[tokio::test]
    async fn separate_callers_and_operations_do_not_share_windows() {
        let limiter = limiter();
        let rules = [rule(1, 60)];
        let now = Utc::now();
        assert!(limiter.allow_at("u1", "submit", &rules, now).await.allowed);
        assert!(!limiter.allow_at("u1", "submit", &rules, now).await.allowed);
        assert!(limiter.allow_at("u2", "submit", &rules, now).await.allowed);
        assert!(limiter.allow_at("u1", "session", &rules, now).await.allowed);
    }

    #[tokio::test]
    async fn concurrent_calls_for_one_caller_admit_exactly_one() {
        let limiter = limiter();
        let rules = [rule(1, 1)];
        let now = Utc::now();
        let (a, b) = tokio::join!(
            limiter.allow_at("u1", "submit", &rules, now),
            limiter.allow_at("u1", "submit", &rules, now),
        );
        assert_eq!([a.allowed, b.allowed].iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test]
    async fn concurrent_tasks_for_one_caller_admit_exactly_one() {
        let limiter = limiter();
        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter
                        .allow_at("u1", "submit", &[rule(1, 1)], now)
                        .await
                        .allowed
                })
            })
            .collect();
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
