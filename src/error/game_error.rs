use crate::error::error_code;
use crate::error::store_error::StoreError;
use crate::response::api_response::ApiErrorResponse;
use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("too many requests, retry after {}ms", .retry_after.as_millis())]
    RateLimited { retry_after: Duration },
    /// 重试次数用尽，调用方应整体重试
    #[error("please try again")]
    StorageConflict,
    #[error("{0} not found")]
    NotFound(String),
    #[error("internal storage error")]
    Storage(String),
}

impl GameError {
    fn get_code(&self) -> u32 {
        match self {
            GameError::InvalidInput(_) => error_code::INVALID_INPUT,
            GameError::RateLimited { .. } => error_code::RATE_LIMITED,
            GameError::StorageConflict => error_code::STORAGE_CONFLICT,
            GameError::NotFound(_) => error_code::NOT_FOUND,
            GameError::Storage(_) => error_code::SOMETHING_WENT_WRONG,
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => GameError::StorageConflict,
            other => GameError::Storage(other.to_string()),
        }
    }
}

/// Retry-After 头使用整秒，向上取整
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = retry_after.as_millis() as u64;
    ((millis + 999) / 1000).max(1)
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status_code = match self {
            GameError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GameError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GameError::StorageConflict => StatusCode::CONFLICT,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let GameError::Storage(detail) = &self {
            // 内部细节只写日志
            tracing::error!("storage error: {}", detail);
        }

        let mut response = ApiErrorResponse::send(
            status_code.as_u16(),
            self.get_code(),
            Some(self.to_string()),
        );
        if let GameError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
        }
        response
    }
}
