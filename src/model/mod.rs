pub mod daily;
pub mod event;
pub mod identity;
pub mod progress;
pub mod rank_cursor;
pub mod rate_limit;
pub mod submission;
pub mod user;
