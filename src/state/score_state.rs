use crate::service::score_service::ScoreService;
use std::sync::Arc;

#[derive(Clone)]
pub struct ScoreState {
    pub score_service: Arc<ScoreService>,
}

impl ScoreState {
    pub fn new(score_service: &Arc<ScoreService>) -> Self {
        Self {
            score_service: Arc::clone(score_service),
        }
    }
}
