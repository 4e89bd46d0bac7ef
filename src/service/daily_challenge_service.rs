//! 每日挑战生成
//!
//! 创建以日期为 key，只新建不覆盖，重复触发不会产生第二个谜题；
//! 关卡内容可以补全：生成失败后手动重新触发会填上缺失的关卡描述。
use crate::db::store::{Collection, Precondition};
use crate::error::game_error::GameError;
use crate::error::store_error::StoreError;
use crate::model::daily::{format_date, DailyChallenge};
use crate::model::event::GameEvent;
use crate::repository::game_repository::{put, GameRepository, GameRepositoryTrait};
use crate::service::event_bus::EventBus;
use crate::service::level_generator::LevelGenerator;
use crate::utils::encrypt;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutcome {
    pub date: String,
    pub created: bool,
    /// 本次补全了缺失的关卡描述
    pub repaired: bool,
    /// 关卡描述已就绪
    pub ready: bool,
}

/// 由日期推导种子，便于复现
pub fn daily_seed(date: &str) -> u64 {
    encrypt::md5_seed(&format!("daily:{date}"))
}

pub struct DailyChallengeService {
    repo: GameRepository,
    generator: Arc<dyn LevelGenerator>,
    events: EventBus,
    max_retries: u32,
}

impl DailyChallengeService {
    pub fn new(
        repo: &GameRepository,
        generator: Arc<dyn LevelGenerator>,
        events: &EventBus,
        max_retries: u32,
    ) -> Self {
        Self {
            repo: repo.clone(),
            generator,
            events: events.clone(),
            max_retries,
        }
    }

    pub async fn generate_for_today(&self) -> Result<GenerateOutcome, GameError> {
        self.generate_for(Utc::now().date_naive()).await
    }

    pub async fn generate_for(&self, date: NaiveDate) -> Result<GenerateOutcome, GameError> {
        let key = format_date(date);
        let seed = daily_seed(&key);
        let shell = DailyChallenge::new(&key, seed, Utc::now());

        let create = put(Collection::DailyChallenges, key.as_str(), &shell, Precondition::Absent)?;
        match self.repo.commit(vec![create]).await {
            Ok(()) => {
                tracing::info!("daily challenge created - date:{} | seed:{}", key, seed);
                let ready = self.populate(&key, seed).await?;
                if ready {
                    self.events
                        .deliver(GameEvent::ChallengeCreated { date: key.clone() })
                        .await;
                }
                Ok(GenerateOutcome {
                    date: key,
                    created: true,
                    repaired: false,
                    ready,
                })
            }
            Err(StoreError::Conflict) => self.revisit(key).await,
            Err(err) => Err(err.into()),
        }
    }

    /// 文档已存在：缺关卡就补全，没发过通知就再发一次事件
    async fn revisit(&self, key: String) -> Result<GenerateOutcome, GameError> {
        let existing = self
            .repo
            .get_daily_challenge(&key)
            .await?
            .ok_or(GameError::StorageConflict)?;

        let mut outcome = GenerateOutcome {
            date: key.clone(),
            created: false,
            repaired: false,
            ready: existing.value.is_ready(),
        };
        if !outcome.ready {
            tracing::warn!("daily challenge missing level, repairing - date:{}", key);
            outcome.ready = self.populate(&key, existing.value.seed).await?;
            outcome.repaired = outcome.ready;
        }
        if outcome.ready && !existing.value.notification_sent {
            self.events
                .deliver(GameEvent::ChallengeCreated { date: key })
                .await;
        }
        Ok(outcome)
    }

    /// 生成关卡并写入，生成失败时文档保持缺关卡状态
    async fn populate(&self, key: &str, seed: u64) -> Result<bool, GameError> {
        let descriptor = match self.generator.generate_level(seed).await {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::error!(
                    "level generation failed - date:{} | seed:{} | err:{}",
                    key,
                    seed,
                    err
                );
                return Ok(false);
            }
        };

        for _ in 0..=self.max_retries {
            let Some(mut challenge) = self.repo.get_daily_challenge(key).await? else {
                return Err(GameError::NotFound(format!("daily challenge {key}")));
            };
            if challenge.value.is_ready() {
                return Ok(true);
            }
            let precondition = challenge.precondition();
            challenge.value.level_descriptor = Some(descriptor.clone());
            let write = put(Collection::DailyChallenges, key, &challenge.value, precondition)?;
            match self.repo.commit(vec![write]).await {
                Ok(()) => return Ok(true),
                Err(StoreError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(GameError::StorageConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::store::SharedStore;
    use crate::error::transport_error::TransportError;
    use crate::model::daily::LevelDescriptor;
    use crate::service::level_generator::MockLevelGenerator;
    use serde_json::json;
    use tokio::sync::mpsc::Receiver;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 27).unwrap()
    }

    fn fixture(generator: MockLevelGenerator) -> (GameRepository, DailyChallengeService, Receiver<GameEvent>) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let repo = GameRepository::new(&store);
        let (bus, events) = EventBus::channel(16);
        let service = DailyChallengeService::new(&repo, Arc::new(generator), &bus, 3);
        (repo, service, events)
    }

    fn drain(events: &mut Receiver<GameEvent>) -> Vec<GameEvent> {
        let mut seen = vec![];
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[test]
    fn seed_is_stable_per_date() {
        assert_eq!(daily_seed("2026-01-27"), daily_seed("2026-01-27"));
        assert_ne!(daily_seed("2026-01-27"), daily_seed("2026-01-28"));
    }

    #[tokio::test]
    async fn repeated_generation_creates_exactly_one_challenge() {
        let mut generator = MockLevelGenerator::new();
        let expected_seed = daily_seed("2026-01-27");
        generator
            .expect_generate_level()
            .withf(move |seed| *seed == expected_seed)
            .times(1)
            .returning(|seed| Ok(LevelDescriptor(json!({ "seed": seed, "cells": 37 }))));
        let (repo, service, mut events) = fixture(generator);

        let first = service.generate_for(date()).await.unwrap();
        assert!(first.created && first.ready);
        let stored = repo.get_daily_challenge("2026-01-27").await.unwrap().unwrap();

        for _ in 0..3 {
            let again = service.generate_for(date()).await.unwrap();
            assert!(!again.created);
            assert!(!again.repaired);
        }
        let after = repo.get_daily_challenge("2026-01-27").await.unwrap().unwrap();
        assert_eq!(after, stored);
        assert_eq!(after.value.completion_count, 0);
        assert!(!after.value.notification_sent);

        // 通知还没发出，每次都会重新提醒分发器
        let seen = drain(&mut events);
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|event| *event
            == GameEvent::ChallengeCreated {
                date: "2026-01-27".to_string()
            }));
    }

    #[tokio::test]
    async fn failed_generation_is_repaired_by_retrigger() {
        let mut generator = MockLevelGenerator::new();
        let mut calls = 0;
        generator.expect_generate_level().times(2).returning(move |seed| {
            calls += 1;
            if calls == 1 {
                Err(TransportError::Request("generator down".to_string()))
            } else {
                Ok(LevelDescriptor(json!({ "seed": seed })))
            }
        });
        let (repo, service, mut events) = fixture(generator);

        let first = service.generate_for(date()).await.unwrap();
        assert!(first.created);
        assert!(!first.ready);
        let shell = repo.get_daily_challenge("2026-01-27").await.unwrap().unwrap();
        assert!(shell.value.level_descriptor.is_none());
        assert!(drain(&mut events).is_empty());

        let second = service.generate_for(date()).await.unwrap();
        assert!(!second.created);
        assert!(second.repaired && second.ready);
        let repaired = repo.get_daily_challenge("2026-01-27").await.unwrap().unwrap();
        assert_eq!(repaired.value.seed, shell.value.seed);
        assert!(repaired.value.level_descriptor.is_some());
        assert_eq!(drain(&mut events).len(), 1);
    }

    #[tokio::test]
    async fn notified_challenge_is_left_alone() {
        let mut generator = MockLevelGenerator::new();
        generator
            .expect_generate_level()
            .times(1)
            .returning(|seed| Ok(LevelDescriptor(json!({ "seed": seed }))));
        let (repo, service, mut events) = fixture(generator);
        service.generate_for(date()).await.unwrap();

        let mut challenge = repo.get_daily_challenge("2026-01-27").await.unwrap().unwrap();
        let precondition = challenge.precondition();
        challenge.value.notification_sent = true;
        repo.commit(vec![put(
            Collection::DailyChallenges,
            "2026-01-27",
            &challenge.value,
            precondition,
        )
        .unwrap()])
            .await
            .unwrap();
        drain(&mut events);

        let again = service.generate_for(date()).await.unwrap();
        assert!(!again.created);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn challenge_event_survives_a_full_queue() {
        let mut generator = MockLevelGenerator::new();
        generator
            .expect_generate_level()
            .times(1)
            .returning(|seed| Ok(LevelDescriptor(json!({ "seed": seed }))));
        let store: SharedStore = Arc::new(MemoryStore::new());
        let repo = GameRepository::new(&store);
        let (bus, mut events) = EventBus::channel(2);
        let service = Arc::new(DailyChallengeService::new(&repo, Arc::new(generator), &bus, 3));

        // 一次重算的排名事件先把队列塞满
        for user in ["a", "b"] {
            bus.publish(GameEvent::RankChanged {
                user_id: user.to_string(),
                old_rank: 40,
                new_rank: 1,
            });
        }
        let task = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.generate_for(date()).await })
        };

        let mut seen = vec![];
        for _ in 0..3 {
            seen.push(events.recv().await.unwrap());
        }
        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.created && outcome.ready);
        assert_eq!(
            seen.last(),
            Some(&GameEvent::ChallengeCreated {
                date: "2026-01-27".to_string()
            })
        );
    }
}
