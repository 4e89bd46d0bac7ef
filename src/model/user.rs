//! 玩家与排行榜数据模型
//!
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 每个玩家最多保留的推送 token 数
pub const MAX_DEVICE_TOKENS: usize = 5;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    /// 只由提交流程修改
    pub total_stars: u32,
    #[serde(default)]
    pub device_tokens: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: &str, display_name: &str, avatar_ref: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            avatar_ref,
            total_stars: 0,
            device_tokens: vec![],
            created_at: now,
        }
    }

    /// 新 token 放到末尾，超出上限时丢弃最旧的
    pub fn register_device_token(&mut self, token: &str) -> bool {
        if self.device_tokens.last().map(String::as_str) == Some(token) {
            return false;
        }
        self.device_tokens.retain(|t| t != token);
        self.device_tokens.push(token.to_string());
        if self.device_tokens.len() > MAX_DEVICE_TOKENS {
            let overflow = self.device_tokens.len() - MAX_DEVICE_TOKENS;
            self.device_tokens.drain(..overflow);
        }
        true
    }
}

/// 全局排行榜的一行，rank 为 0 表示还没参与过排名计算
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    pub total_stars: u32,
    #[serde(default)]
    pub rank: u32,
}

impl LeaderboardEntry {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            display_name: user.display_name.clone(),
            avatar_ref: user.avatar_ref.clone(),
            total_stars: user.total_stars,
            rank: 0,
        }
    }
}

/// 星数降序，userId 升序
pub fn global_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.total_stars
        .cmp(&a.total_stars)
        .then_with(|| a.user_id.cmp(&b.user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: &str, total_stars: u32) -> LeaderboardEntry {
        LeaderboardEntry {
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            avatar_ref: None,
            total_stars,
            rank: 0,
        }
    }

    #[test]
    fn global_order_prefers_stars_then_user_id() {
        let mut rows = vec![entry("carol", 5), entry("bob", 9), entry("alice", 5)];
        rows.sort_by(global_order);
        let ids: Vec<_> = rows.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["bob", "alice", "carol"]);
    }

    #[test]
    fn device_tokens_are_bounded_and_deduplicated() {
        let mut user = User::new("u1", "Player", None, Utc::now());
        for i in 0..7 {
            user.register_device_token(&format!("t{i}"));
        }
        assert_eq!(user.device_tokens.len(), MAX_DEVICE_TOKENS);
        assert_eq!(user.device_tokens.first().map(String::as_str), Some("t2"));

        assert!(user.register_device_token("t3"));
        assert_eq!(user.device_tokens.last().map(String::as_str), Some("t3"));
        assert_eq!(user.device_tokens.len(), MAX_DEVICE_TOKENS);
        assert!(!user.register_device_token("t3"));
    }
}
