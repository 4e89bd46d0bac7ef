use serde::Deserialize;
use validator::Validate;

pub const DEFAULT_TOP_LIMIT: usize = 50;

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct TopQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<usize>,
}

impl TopQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_TOP_LIMIT)
    }
}
