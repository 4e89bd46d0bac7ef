use crate::dto::session_dto::SessionReq;
use crate::error::{api_error::ApiError, request_error::ValidatedRequest};
use crate::model::identity::Identity;
use crate::model::user::LeaderboardEntry;
use crate::response::api_response::ApiSuccessResponse;
use crate::state::session_state::SessionState;
use axum::{extract::State, Extension, Json};
use axum_macros::debug_handler;

// 首次认证建档，之后刷新昵称头像并登记推送 token
#[debug_handler]
pub async fn start_session(
    State(state): State<SessionState>,
    Extension(identity): Extension<Identity>,
    ValidatedRequest(payload): ValidatedRequest<SessionReq>,
) -> Result<Json<ApiSuccessResponse<LeaderboardEntry>>, ApiError> {
    let entry = state
        .user_service
        .start_session(&identity, payload.device_token.as_deref())
        .await?;
    Ok(Json(ApiSuccessResponse::send(entry)))
}
