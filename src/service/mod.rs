pub mod daily_challenge_service;
pub mod event_bus;
pub mod level_generator;
pub mod notification_service;
pub mod push_transport;
pub mod rank_service;
pub mod rate_limiter;
pub mod scheduler_service;
pub mod score_service;
pub mod token_service;
pub mod user_service;
