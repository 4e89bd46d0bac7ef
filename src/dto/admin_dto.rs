use serde::Deserialize;
use validator::Validate;

/// 手动触发每日挑战生成，不传日期则为今天 (UTC)
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct GenerateReq {
    #[validate(length(equal = 10, message = "date must be YYYY-MM-DD"))]
    pub date: Option<String>,
}
