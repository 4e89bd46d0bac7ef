use crate::dto::leaderboard_dto::TopQuery;
use crate::error::game_error::GameError;
use crate::error::{api_error::ApiError, request_error::ValidatedQuery};
use crate::model::identity::Identity;
use crate::model::user::LeaderboardEntry;
use crate::repository::game_repository::GameRepositoryTrait;
use crate::response::api_response::ApiSuccessResponse;
use crate::state::query_state::QueryState;
use axum::{extract::State, Extension, Json};

pub async fn get_top_entries(
    State(state): State<QueryState>,
    ValidatedQuery(query): ValidatedQuery<TopQuery>,
) -> Result<Json<ApiSuccessResponse<Vec<LeaderboardEntry>>>, ApiError> {
    let entries = state
        .rank_service
        .top_entries(query.limit())
        .await
        .map_err(GameError::from)?;
    Ok(Json(ApiSuccessResponse::send(entries)))
}

pub async fn get_my_entry(
    State(state): State<QueryState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiSuccessResponse<LeaderboardEntry>>, ApiError> {
    let entry = state
        .game_repo
        .get_leaderboard_entry(&identity.user_id)
        .await
        .map_err(GameError::from)?
        .ok_or_else(|| GameError::NotFound(format!("leaderboard entry {}", identity.user_id)))?;
    Ok(Json(ApiSuccessResponse::send(entry.value)))
}
