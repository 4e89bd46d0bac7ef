use crate::config::game_config::GameConfig;
use crate::db::store::Collection;
use crate::error::game_error::GameError;
use crate::error::store_error::StoreError;
use crate::model::identity::Identity;
use crate::model::rate_limit::Operation;
use crate::model::user::{LeaderboardEntry, User};
use crate::repository::game_repository::{
    precondition_of, put, GameRepository, GameRepositoryTrait,
};
use crate::service::rate_limiter::RateLimiter;
use chrono::Utc;
use std::sync::Arc;

/// 首次认证时建档，之后同步昵称头像、登记推送 token
pub struct UserService {
    repo: GameRepository,
    rate_limiter: RateLimiter,
    config: Arc<GameConfig>,
}

impl UserService {
    pub fn new(repo: &GameRepository, rate_limiter: &RateLimiter, config: &Arc<GameConfig>) -> Self {
        Self {
            repo: repo.clone(),
            rate_limiter: rate_limiter.clone(),
            config: Arc::clone(config),
        }
    }

    pub async fn start_session(
        &self,
        identity: &Identity,
        device_token: Option<&str>,
    ) -> Result<LeaderboardEntry, GameError> {
        let decision = self
            .rate_limiter
            .allow(
                &identity.user_id,
                Operation::Session.as_str(),
                self.config.rules_for(Operation::Session),
            )
            .await;
        if !decision.allowed {
            return Err(GameError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        for _ in 0..=self.config.store_max_retries {
            let current_user = self.repo.get_user(&identity.user_id).await?;
            let current_entry = self.repo.get_leaderboard_entry(&identity.user_id).await?;

            let mut user = current_user
                .as_ref()
                .map(|doc| doc.value.clone())
                .unwrap_or_else(|| {
                    User::new(
                        &identity.user_id,
                        &identity.display_name,
                        identity.avatar_ref.clone(),
                        Utc::now(),
                    )
                });
            let mut user_changed = current_user.is_none();
            if user.display_name != identity.display_name || user.avatar_ref != identity.avatar_ref {
                user.display_name = identity.display_name.clone();
                user.avatar_ref = identity.avatar_ref.clone();
                user_changed = true;
            }
            if let Some(token) = device_token {
                user_changed |= user.register_device_token(token);
            }

            // 排名字段保持原值
            let mut entry = LeaderboardEntry::from_user(&user);
            if let Some(existing) = &current_entry {
                entry.rank = existing.value.rank;
            }
            let entry_changed = current_entry.as_ref().map(|doc| &doc.value) != Some(&entry);

            if !user_changed && !entry_changed {
                return Ok(entry);
            }
            let mut writes = vec![];
            if user_changed {
                writes.push(put(
                    Collection::Users,
                    user.id.as_str(),
                    &user,
                    precondition_of(current_user.as_ref()),
                )?);
            }
            if entry_changed {
                writes.push(put(
                    Collection::Leaderboard,
                    user.id.as_str(),
                    &entry,
                    precondition_of(current_entry.as_ref()),
                )?);
            }
            match self.repo.commit(writes).await {
                Ok(()) => {
                    if current_user.is_none() {
                        tracing::info!("user created - user:{}", user.id);
                    }
                    return Ok(entry);
                }
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

    fn identity(name: &str) -> Identity {
        Identity {
            user_id: "u1".to_string(),
            display_name: name.to_string(),
            avatar_ref: None,
        }
    }

    fn service() -> (Arc<MemoryStore>, GameRepository, UserService) {
        let memory = Arc::new(MemoryStore::new());
        let store: SharedStore = memory.clone();
        let repo = GameRepository::new(&store);
        let config = Arc::new(GameConfig::default());
        let limiter = RateLimiter::new(&repo, config.store_max_retries);
        let service = UserService::new(&repo, &limiter, &config);
        (memory, repo, service)
    }

    #[tokio::test]
    async fn first_session_creates_user_and_leaderboard_row() {
        let (_, repo, service) = service();
        let entry = service
            .start_session(&identity("Hexa"), Some("device-1"))
            .await
            .unwrap();
        assert_eq!(entry.total_stars, 0);
        assert_eq!(entry.rank, 0);

        let user = repo.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.value.display_name, "Hexa");
        assert_eq!(user.value.device_tokens, vec!["device-1".to_string()]);
        assert!(repo.get_leaderboard_entry("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unchanged_session_writes_nothing_but_rate_window() {
        let (memory, _, service) = service();
        service.start_session(&identity("Hexa"), None).await.unwrap();
        let commits = memory.commit_count();

        service.start_session(&identity("Hexa"), None).await.unwrap();
        // 只有限流窗口的一次写入
        assert_eq!(memory.commit_count(), commits + 1);
    }

    #[tokio::test]
    async fn rename_is_mirrored_to_leaderboard() {
        let (_, repo, service) = service();
        service.start_session(&identity("Hexa"), None).await.unwrap();
        service.start_session(&identity("Hexagon"), None).await.unwrap();

        let entry = repo.get_leaderboard_entry("u1").await.unwrap().unwrap();
        assert_eq!(entry.value.display_name, "Hexagon");
    }
}
