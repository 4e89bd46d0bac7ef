pub mod admin_state;
pub mod auth_state;
pub mod limit_state;
pub mod query_state;
pub mod score_state;
pub mod session_state;
