use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 批量排名任务超时后保存的进度
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankCursor {
    pub offset: usize,
    pub updated_at: DateTime<Utc>,
}
