use crate::handler::daily_handler;
use crate::middleware::rate_limit::rate_limit;
use crate::state::{limit_state::LimitState, query_state::QueryState};
use axum::{middleware, routing::get, Router};

pub fn routes(query_limit: &LimitState) -> Router<QueryState> {
    Router::new().nest(
        "/daily",
        Router::new()
            .route("/:date", get(daily_handler::get_challenge))
            .route("/:date/entries", get(daily_handler::get_top_entries))
            .route_layer(middleware::from_fn_with_state(query_limit.clone(), rate_limit)),
    )
}
