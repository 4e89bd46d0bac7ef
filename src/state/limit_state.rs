use crate::config::game_config::GameConfig;
use crate::model::rate_limit::{Operation, RateRule};
use crate::service::rate_limiter::RateLimiter;
use std::net::IpAddr;
use std::sync::Arc;

/// 路由层限流，一个操作一份
#[derive(Clone)]
pub struct LimitState {
    pub rate_limiter: RateLimiter,
    pub operation: Operation,
    pub rules: Arc<Vec<RateRule>>,
    pub trusted_proxies: Arc<Vec<IpAddr>>,
}

impl LimitState {
    pub fn new(rate_limiter: &RateLimiter, config: &GameConfig, operation: Operation) -> Self {
        Self {
            rate_limiter: rate_limiter.clone(),
            operation,
            rules: Arc::new(config.rules_for(operation).to_vec()),
            trusted_proxies: Arc::new(config.trusted_proxies.clone()),
        }
    }
}
