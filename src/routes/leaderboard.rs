use crate::handler::leaderboard_handler;
use crate::middleware::{auth::auth, rate_limit::rate_limit};
use crate::state::{auth_state::AuthState, limit_state::LimitState, query_state::QueryState};
use axum::{middleware, routing::get, Router};

pub fn routes(auth_state: &AuthState, query_limit: &LimitState) -> Router<QueryState> {
    let public = Router::new()
        .route("/top", get(leaderboard_handler::get_top_entries))
        .route_layer(middleware::from_fn_with_state(query_limit.clone(), rate_limit));
    // 先认证，再按 userId 限流
    let personal = Router::new()
        .route("/me", get(leaderboard_handler::get_my_entry))
        .route_layer(middleware::from_fn_with_state(query_limit.clone(), rate_limit))
        .route_layer(middleware::from_fn_with_state(auth_state.clone(), auth));

    Router::new().nest("/leaderboard", public.merge(personal))
}
