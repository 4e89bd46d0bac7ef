pub mod api_error;
pub mod error_code;
pub mod game_error;
pub mod request_error;
pub mod store_error;
pub mod token_error;
pub mod transport_error;
