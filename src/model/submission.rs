use chrono::{DateTime, Utc};

/// 提交目标：普通关卡或某天的每日挑战
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionTarget {
    Level(u32),
    Daily(String),
}

/// 客户端提交的一次通关，只进不出
#[derive(Clone, Debug)]
pub struct ScoreSubmission {
    pub user_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub target: SubmissionTarget,
    pub stars: i32,
    pub time_ms: i64,
    pub submitted_at: DateTime<Utc>,
}
