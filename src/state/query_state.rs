use crate::repository::game_repository::GameRepository;
use crate::service::rank_service::RankService;

/// 排行榜、每日挑战的只读查询
#[derive(Clone)]
pub struct QueryState {
    pub rank_service: RankService,
    pub game_repo: GameRepository,
}

impl QueryState {
    pub fn new(game_repo: &GameRepository, rank_service: &RankService) -> Self {
        Self {
            rank_service: rank_service.clone(),
            game_repo: game_repo.clone(),
        }
    }
}
