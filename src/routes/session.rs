use crate::{handler::session_handler, state::session_state::SessionState};
use axum::{routing::post, Router};

pub fn routes() -> Router<SessionState> {
    Router::new().route("/session", post(session_handler::start_session))
}
