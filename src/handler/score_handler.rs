use crate::dto::score_dto::SubmitScoreReq;
use crate::error::{api_error::ApiError, request_error::ValidatedRequest};
use crate::model::identity::Identity;
use crate::response::api_response::ApiSuccessResponse;
use crate::service::score_service::SubmitOutcome;
use crate::state::score_state::ScoreState;
use axum::{extract::State, Extension, Json};
use axum_macros::debug_handler;
use chrono::Utc;

#[debug_handler]
pub async fn submit_score(
    State(state): State<ScoreState>,
    Extension(identity): Extension<Identity>,
    ValidatedRequest(payload): ValidatedRequest<SubmitScoreReq>,
) -> Result<Json<ApiSuccessResponse<SubmitOutcome>>, ApiError> {
    let submission = payload.into_submission(identity, Utc::now())?;
    let outcome = state.score_service.submit(submission).await?;
    Ok(Json(ApiSuccessResponse::send(outcome)))
}
