pub mod admin_handler;
pub mod daily_handler;
pub mod leaderboard_handler;
pub mod score_handler;
pub mod session_handler;
