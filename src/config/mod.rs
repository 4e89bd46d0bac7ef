pub mod game_config;
pub mod parameter;
