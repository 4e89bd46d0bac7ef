pub mod auth;
pub mod body_signature;
pub mod rate_limit;
