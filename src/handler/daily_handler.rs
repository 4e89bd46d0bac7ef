use crate::dto::daily_dto::DailyChallengeRes;
use crate::dto::leaderboard_dto::TopQuery;
use crate::error::game_error::GameError;
use crate::error::{api_error::ApiError, request_error::ValidatedQuery};
use crate::model::daily::{format_date, parse_date, DailyChallengeEntry};
use crate::repository::game_repository::GameRepositoryTrait;
use crate::response::api_response::ApiSuccessResponse;
use crate::state::query_state::QueryState;
use axum::extract::{Path, State};
use axum::Json;

fn challenge_key(raw: &str) -> Result<String, GameError> {
    parse_date(raw)
        .map(format_date)
        .ok_or_else(|| GameError::NotFound(format!("daily challenge {raw}")))
}

pub async fn get_challenge(
    State(state): State<QueryState>,
    Path(date): Path<String>,
) -> Result<Json<ApiSuccessResponse<DailyChallengeRes>>, ApiError> {
    let key = challenge_key(&date)?;
    let challenge = state
        .game_repo
        .get_daily_challenge(&key)
        .await
        .map_err(GameError::from)?
        .ok_or_else(|| GameError::NotFound(format!("daily challenge {key}")))?;
    Ok(Json(ApiSuccessResponse::send(challenge.value.into())))
}

pub async fn get_top_entries(
    State(state): State<QueryState>,
    Path(date): Path<String>,
    ValidatedQuery(query): ValidatedQuery<TopQuery>,
) -> Result<Json<ApiSuccessResponse<Vec<DailyChallengeEntry>>>, ApiError> {
    let key = challenge_key(&date)?;
    if state
        .game_repo
        .get_daily_challenge(&key)
        .await
        .map_err(GameError::from)?
        .is_none()
    {
        return Err(GameError::NotFound(format!("daily challenge {key}")).into());
    }
    let entries = state
        .rank_service
        .daily_top_entries(&key, query.limit())
        .await
        .map_err(GameError::from)?;
    Ok(Json(ApiSuccessResponse::send(entries)))
}
