pub mod admin_dto;
pub mod daily_dto;
pub mod leaderboard_dto;
pub mod score_dto;
pub mod session_dto;
