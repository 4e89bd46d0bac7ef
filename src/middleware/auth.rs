use crate::error::{api_error::ApiError, token_error::TokenError};
use crate::state::auth_state::AuthState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum_extra::headers::authorization::{Authorization, Bearer};
use axum_extra::TypedHeader;

/// 校验 Bearer token，把调用方身份放进 request extensions
pub async fn auth(
    State(state): State<AuthState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(TokenError::MissingToken)?;
    let identity = state.token_service.verify(bearer.token())?;
    tracing::debug!("auth - user:{} | path:{}", identity.user_id, request.uri().path());
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
