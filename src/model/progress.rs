use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一次通关成绩
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attempt {
    pub stars: u8,
    pub time_ms: u64,
}

impl Attempt {
    /// 星数高者胜；星数相同用时短者胜
    pub fn improves_on(&self, best: &Attempt) -> bool {
        self.stars > best.stars || (self.stars == best.stars && self.time_ms < best.time_ms)
    }
}

/// 玩家在某一关的最好成绩
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub user_id: String,
    pub level_id: u32,
    pub stars: u8,
    pub best_time_ms: u64,
    pub updated_at: DateTime<Utc>,
}

impl LevelProgress {
    pub fn best(&self) -> Attempt {
        Attempt {
            stars: self.stars,
            time_ms: self.best_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(stars: u8, time_ms: u64) -> Attempt {
        Attempt { stars, time_ms }
    }

    #[test]
    fn improvement_test() {
        assert!(attempt(2, 9000).improves_on(&attempt(1, 1000)));
        assert!(attempt(2, 3999).improves_on(&attempt(2, 4000)));
        assert!(!attempt(2, 4000).improves_on(&attempt(2, 4000)));
        assert!(!attempt(2, 5000).improves_on(&attempt(2, 4000)));
        assert!(!attempt(1, 100).improves_on(&attempt(2, 9000)));
    }
}
