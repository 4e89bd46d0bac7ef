use crate::handler::admin_handler;
use crate::middleware::{body_signature::body_signature_verify, rate_limit::rate_limit};
use crate::state::{admin_state::AdminState, limit_state::LimitState};
use axum::{middleware, routing::post, Router};

pub fn routes(admin_state: &AdminState, trigger_limit: &LimitState) -> Router<AdminState> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/daily/generate", post(admin_handler::generate_daily))
            .route("/ranks/recompute", post(admin_handler::recompute_ranks))
            // 签名不通过的请求不占用限流额度
            .route_layer(middleware::from_fn_with_state(trigger_limit.clone(), rate_limit))
            .route_layer(middleware::from_fn_with_state(
                admin_state.clone(),
                body_signature_verify,
            )),
    )
}
