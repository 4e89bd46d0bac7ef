pub mod admin;
pub mod daily;
pub mod leaderboard;
pub mod root;
pub mod score;
pub mod session;
