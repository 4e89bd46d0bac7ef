use crate::model::daily::{DailyChallenge, LevelDescriptor};
use serde::Serialize;

/// 对外展示的每日挑战，不包含推送状态
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChallengeRes {
    pub date: String,
    pub seed: u64,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_descriptor: Option<LevelDescriptor>,
    pub completion_count: u64,
}

impl From<DailyChallenge> for DailyChallengeRes {
    fn from(challenge: DailyChallenge) -> Self {
        Self {
            date: challenge.date,
            seed: challenge.seed,
            ready: challenge.level_descriptor.is_some(),
            level_descriptor: challenge.level_descriptor,
            completion_count: challenge.completion_count,
        }
    }
}
