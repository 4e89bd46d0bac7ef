use crate::{handler::score_handler, state::score_state::ScoreState};
use axum::{routing::post, Router};

pub fn routes() -> Router<ScoreState> {
    Router::new().nest(
        "/score",
        Router::new().route("/submit", post(score_handler::submit_score)),
    )
}
