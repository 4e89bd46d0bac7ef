use crate::service::daily_challenge_service::DailyChallengeService;
use crate::service::rank_service::RankService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AdminState {
    pub daily_service: Arc<DailyChallengeService>,
    pub rank_service: RankService,
    /// 管理接口 body 签名密钥
    pub admin_secret: Arc<String>,
}

impl AdminState {
    pub fn new(
        daily_service: &Arc<DailyChallengeService>,
        rank_service: &RankService,
        admin_secret: &str,
    ) -> Self {
        Self {
            daily_service: Arc::clone(daily_service),
            rank_service: rank_service.clone(),
            admin_secret: Arc::new(admin_secret.to_string()),
        }
    }
}
