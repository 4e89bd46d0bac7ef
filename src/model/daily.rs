use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 关卡生成器返回的关卡描述，对本服务不透明
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct LevelDescriptor(pub serde_json::Value);

/// 某个 UTC 日期的每日挑战，以日期为主键
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChallenge {
    pub date: String,
    pub seed: u64,
    /// 为空说明生成关卡失败，需要补全
    #[serde(default)]
    pub level_descriptor: Option<LevelDescriptor>,
    pub completion_count: u64,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl DailyChallenge {
    pub fn new(date: &str, seed: u64, now: DateTime<Utc>) -> Self {
        Self {
            date: date.to_string(),
            seed,
            level_descriptor: None,
            completion_count: 0,
            notification_sent: false,
            created_at: now,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.level_descriptor.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChallengeEntry {
    pub date: String,
    pub user_id: String,
    pub display_name: String,
    pub stars: u8,
    pub completion_time_ms: u64,
    pub total_stars_snapshot: u32,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub rank: u32,
}

/// 星数降序，用时升序，userId 升序
pub fn daily_order(a: &DailyChallengeEntry, b: &DailyChallengeEntry) -> Ordering {
    b.stars
        .cmp(&a.stars)
        .then_with(|| a.completion_time_ms.cmp(&b.completion_time_ms))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// 只接受严格的 YYYY-MM-DD
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}
