use crate::dto::admin_dto::GenerateReq;
use crate::error::game_error::GameError;
use crate::error::{api_error::ApiError, request_error::ValidatedRequest};
use crate::model::daily::parse_date;
use crate::response::api_response::ApiSuccessResponse;
use crate::service::daily_challenge_service::GenerateOutcome;
use crate::service::rank_service::RecomputeReport;
use crate::state::admin_state::AdminState;
use axum::{extract::State, Json};
use axum_macros::debug_handler;

// 手动触发每日挑战，幂等；可以补全生成失败的关卡
#[debug_handler]
pub async fn generate_daily(
    State(state): State<AdminState>,
    ValidatedRequest(payload): ValidatedRequest<GenerateReq>,
) -> Result<Json<ApiSuccessResponse<GenerateOutcome>>, ApiError> {
    let outcome = match payload.date {
        Some(raw) => {
            let date = parse_date(&raw)
                .ok_or_else(|| GameError::InvalidInput(format!("date `{raw}` is not YYYY-MM-DD")))?;
            state.daily_service.generate_for(date).await?
        }
        None => state.daily_service.generate_for_today().await?,
    };
    tracing::info!(
        "generate_daily manual trigger - date:{} | created:{} | ready:{}",
        outcome.date,
        outcome.created,
        outcome.ready
    );
    Ok(Json(ApiSuccessResponse::send(outcome)))
}

// 立即跑一次批量排名
pub async fn recompute_ranks(
    State(state): State<AdminState>,
) -> Result<Json<ApiSuccessResponse<RecomputeReport>>, ApiError> {
    let report = state
        .rank_service
        .run_scheduled_batch()
        .await
        .map_err(GameError::from)?;
    Ok(Json(ApiSuccessResponse::send(report)))
}
