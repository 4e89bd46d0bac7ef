use crate::response::api_response::ApiErrorResponse;
use super::error_code;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;


#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid token")]
    InvalidToken(String),
    #[error("Token has expired")]
    TokenExpired,
    #[error("Missing Bearer token")]
    MissingToken,
}

impl TokenError {
    fn get_code(&self) -> u32 {
        match self {
            TokenError::InvalidToken(_) => error_code::INVALID_TOKEN,
            TokenError::TokenExpired => error_code::TOKEN_EXPIRED,
            TokenError::MissingToken => error_code::MISSING_TOKEN,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::TokenExpired,
            _ => TokenError::InvalidToken(err.to_string()),
        }
    }
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        if let TokenError::InvalidToken(detail) = &self {
            tracing::debug!("token rejected: {}", detail);
        }
        ApiErrorResponse::send(
            StatusCode::UNAUTHORIZED.as_u16(),
            self.get_code(),
            Some(self.to_string()),
        )
    }
}
