//! 成绩提交传输用到的数据结构
use crate::error::game_error::GameError;
use crate::model::identity::Identity;
use crate::model::submission::{ScoreSubmission, SubmissionTarget};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

/// levelId 和 date 二选一；星数、用时的范围由提交流程统一校验
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreReq {
    pub level_id: Option<u32>,
    pub date: Option<String>,
    pub stars: i32,
    pub time_ms: i64,
}

impl SubmitScoreReq {
    pub fn into_submission(
        self,
        identity: Identity,
        submitted_at: DateTime<Utc>,
    ) -> Result<ScoreSubmission, GameError> {
        let target = match (self.level_id, self.date) {
            (Some(level_id), None) => SubmissionTarget::Level(level_id),
            (None, Some(date)) => SubmissionTarget::Daily(date),
            _ => {
                return Err(GameError::InvalidInput(
                    "exactly one of levelId and date is required".to_string(),
                ))
            }
        };
        Ok(ScoreSubmission {
            user_id: identity.user_id,
            display_name: identity.display_name,
            avatar_ref: identity.avatar_ref,
            target,
            stars: self.stars,
            time_ms: self.time_ms,
            submitted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: "u1".to_string(),
            display_name: "Hexa".to_string(),
            avatar_ref: None,
        }
    }

    #[test]
    fn target_shapes_are_disjoint() {
        let level: SubmitScoreReq =
            serde_json::from_str(r#"{"levelId":4,"stars":2,"timeMs":1200}"#).unwrap();
        let submission = level.into_submission(identity(), Utc::now()).unwrap();
        assert_eq!(submission.target, SubmissionTarget::Level(4));

        let daily: SubmitScoreReq =
            serde_json::from_str(r#"{"date":"2026-03-14","stars":2,"timeMs":1200}"#).unwrap();
        let submission = daily.into_submission(identity(), Utc::now()).unwrap();
        assert_eq!(submission.target, SubmissionTarget::Daily("2026-03-14".to_string()));

        for raw in [
            r#"{"levelId":4,"date":"2026-03-14","stars":2,"timeMs":1200}"#,
            r#"{"stars":2,"timeMs":1200}"#,
        ] {
            let req: SubmitScoreReq = serde_json::from_str(raw).unwrap();
            assert!(matches!(
                req.into_submission(identity(), Utc::now()),
                Err(GameError::InvalidInput(_))
            ));
        }
    }
}
