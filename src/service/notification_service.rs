//! 通知分发
//!
//! 推送失败只记录日志，不回滚任何状态，也不影响触发事件的流程。
use crate::db::store::Collection;
use crate::error::store_error::StoreError;
use crate::model::event::GameEvent;
use crate::repository::game_repository::{put, GameRepository, GameRepositoryTrait};
use crate::service::push_transport::{PushMessage, PushTransport};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

pub struct NotificationService {
    repo: GameRepository,
    transport: Arc<dyn PushTransport>,
    rank_threshold: u32,
    daily_topic: String,
    max_retries: u32,
}

/// 排名变化的推送文案
pub fn rank_change_message(old_rank: u32, new_rank: u32) -> PushMessage {
    let places = old_rank.abs_diff(new_rank);
    let (title, body) = if new_rank < old_rank {
        (
            "You're climbing!".to_string(),
            format!("You moved up {places} places to #{new_rank} on the leaderboard."),
        )
    } else {
        (
            "You've been overtaken".to_string(),
            format!("You dropped {places} places to #{new_rank}. Play a level to win them back!"),
        )
    };
    PushMessage::new(title, body, "leaderboard")
        .with_data("rank", new_rank)
        .with_data("previousRank", old_rank)
}

pub fn challenge_message(date: &str) -> PushMessage {
    PushMessage::new(
        "Today's daily challenge is here",
        "A new hex puzzle is waiting. Can you top today's board?",
        "daily",
    )
    .with_data("date", date)
}

impl NotificationService {
    pub fn new(
        repo: &GameRepository,
        transport: Arc<dyn PushTransport>,
        rank_threshold: u32,
        daily_topic: &str,
        max_retries: u32,
    ) -> Self {
        Self {
            repo: repo.clone(),
            transport,
            rank_threshold,
            daily_topic: daily_topic.to_string(),
            max_retries,
        }
    }

    /// 启动事件消费任务
    pub fn spawn(self: Arc<Self>, mut receiver: Receiver<GameEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                self.handle(event).await;
            }
            tracing::info!("notification dispatcher stopped");
        })
    }

    pub async fn handle(&self, event: GameEvent) {
        match event {
            GameEvent::RankChanged {
                user_id,
                old_rank,
                new_rank,
            } => {
                self.on_rank_changed(&user_id, old_rank, new_rank).await;
            }
            GameEvent::ChallengeCreated { date } => {
                if let Err(err) = self.on_challenge_created(&date).await {
                    tracing::error!("challenge broadcast failed - date:{} | err:{}", date, err);
                }
            }
        }
    }

    /// 返回成功送达的设备数
    async fn on_rank_changed(&self, user_id: &str, old_rank: u32, new_rank: u32) -> usize {
        if old_rank.abs_diff(new_rank) < self.rank_threshold {
            return 0;
        }
        let user = match self.repo.get_user(user_id).await {
            Ok(Some(user)) => user.value,
            Ok(None) => return 0,
            Err(err) => {
                tracing::error!("rank push - load user:{} | err:{}", user_id, err);
                return 0;
            }
        };

        let message = rank_change_message(old_rank, new_rank);
        let mut delivered = 0;
        for token in &user.device_tokens {
            match self.transport.send_to_token(token, &message).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!("rank push failed - user:{} | err:{}", user_id, err);
                }
            }
        }
        tracing::info!(
            "rank push - user:{} | {} -> {} | delivered:{}",
            user_id,
            old_rank,
            new_rank,
            delivered
        );
        delivered
    }

    /// 先发送再置位，崩溃在两者之间最多导致重复一次
    async fn on_challenge_created(&self, date: &str) -> Result<bool, StoreError> {
        match self.repo.get_daily_challenge(date).await? {
            Some(challenge) if !challenge.value.notification_sent => {}
            _ => return Ok(false),
        }

        if let Err(err) = self
            .transport
            .send_to_topic(&self.daily_topic, &challenge_message(date))
            .await
        {
            // 不置位，下次触发还会重发
            tracing::warn!("challenge broadcast failed - date:{} | err:{}", date, err);
            return Ok(false);
        }

        for _ in 0..=self.max_retries {
            let Some(mut challenge) = self.repo.get_daily_challenge(date).await? else {
                return Ok(true);
            };
            if challenge.value.notification_sent {
                return Ok(true);
            }
            let precondition = challenge.precondition();
            challenge.value.notification_sent = true;
            match self
                .repo
                .commit(vec![put(
                    Collection::DailyChallenges,
                    date,
                    &challenge.value,
                    precondition,
                )?])
                .await
            {
                Ok(()) => {
                    tracing::info!("challenge broadcast sent - date:{}", date);
                    return Ok(true);
                }
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
    use crate::db::store::{Precondition, SharedStore};
    use crate::error::transport_error::TransportError;
    use crate::model::daily::{DailyChallenge, LevelDescriptor};
    use crate::model::user::User;
    use crate::service::push_transport::MockPushTransport;
    use chrono::Utc;
    use serde_json::json;

    fn repo() -> GameRepository {
        let store: SharedStore = Arc::new(MemoryStore::new());
        GameRepository::new(&store)
    }

    async fn seed_user(repo: &GameRepository, tokens: &[&str]) {
        let mut user = User::new("u1", "Player", None, Utc::now());
        for token in tokens {
            user.register_device_token(token);
        }
        repo.commit(vec![put(Collection::Users, "u1", &user, Precondition::Absent).unwrap()])
            .await
            .unwrap();
    }

    async fn seed_challenge(repo: &GameRepository, date: &str) {
        let mut challenge = DailyChallenge::new(date, 7, Utc::now());
        challenge.level_descriptor = Some(LevelDescriptor(json!({ "seed": 7 })));
        repo.commit(vec![put(
            Collection::DailyChallenges,
            date,
            &challenge,
            Precondition::Absent,
        )
        .unwrap()])
            .await
            .unwrap();
    }

    fn service(repo: &GameRepository, transport: MockPushTransport) -> NotificationService {
        NotificationService::new(repo, Arc::new(transport), 10, "daily_challenge", 3)
    }

    #[tokio::test]
    async fn rank_jump_of_threshold_sends_one_push_per_token() {
        let repo = repo();
        seed_user(&repo, &["device-a"]).await;
        let mut transport = MockPushTransport::new();
        transport
            .expect_send_to_token()
            .withf(|token, message| {
                token == "device-a"
                    && message.data.get("screen").map(String::as_str) == Some("leaderboard")
                    && message.body.contains("12 places")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(&repo, transport);
        assert_eq!(service.on_rank_changed("u1", 15, 3).await, 1);
    }

    #[tokio::test]
    async fn small_rank_moves_are_ignored() {
        let repo = repo();
        seed_user(&repo, &["device-a"]).await;
        let mut transport = MockPushTransport::new();
        transport.expect_send_to_token().times(0);

        let service = service(&repo, transport);
        assert_eq!(service.on_rank_changed("u1", 15, 10).await, 0);
        assert_eq!(service.on_rank_changed("u1", 10, 19).await, 0);
    }

    #[tokio::test]
    async fn stale_token_failure_is_swallowed() {
        let repo = repo();
        seed_user(&repo, &["stale", "fresh"]).await;
        let mut transport = MockPushTransport::new();
        transport
            .expect_send_to_token()
            .returning(|token, _| {
                if token == "stale" {
                    Err(TransportError::Unregistered(token.to_string()))
                } else {
                    Ok(())
                }
            });

        let service = service(&repo, transport);
        assert_eq!(service.on_rank_changed("u1", 30, 5).await, 1);
    }

    #[tokio::test]
    async fn challenge_broadcast_happens_once_and_flips_flag() {
        let repo = repo();
        seed_challenge(&repo, "2026-01-27").await;
        let mut transport = MockPushTransport::new();
        transport
            .expect_send_to_topic()
            .withf(|topic, message| {
                topic == "daily_challenge"
                    && message.data.get("screen").map(String::as_str) == Some("daily")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(&repo, transport);
        assert!(service.on_challenge_created("2026-01-27").await.unwrap());
        assert!(!service.on_challenge_created("2026-01-27").await.unwrap());

        let challenge = repo.get_daily_challenge("2026-01-27").await.unwrap().unwrap();
        assert!(challenge.value.notification_sent);
    }

    #[tokio::test]
    async fn failed_broadcast_leaves_flag_unset() {
        let repo = repo();
        seed_challenge(&repo, "2026-01-27").await;
        let mut transport = MockPushTransport::new();
        transport
            .expect_send_to_topic()
            .times(1)
            .returning(|_, _| Err(TransportError::Request("offline".to_string())));

        let service = service(&repo, transport);
        service
            .handle(GameEvent::ChallengeCreated {
                date: "2026-01-27".to_string(),
            })
            .await;

        let challenge = repo.get_daily_challenge("2026-01-27").await.unwrap().unwrap();
        assert!(!challenge.value.notification_sent);
    }

    #[test]
    fn rank_message_describes_direction() {
        let up = rank_change_message(15, 3);
        assert!(up.body.contains("up 12 places to #3"));
        let down = rank_change_message(3, 20);
        assert!(down.body.contains("dropped 17 places to #20"));
        assert_eq!(down.data.get("previousRank").map(String::as_str), Some("3"));
    }
}
