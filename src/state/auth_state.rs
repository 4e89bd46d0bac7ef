use crate::service::token_service::TokenService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthState {
    pub token_service: Arc<TokenService>,
}

impl AuthState {
    pub fn new(token_service: &Arc<TokenService>) -> Self {
        Self {
            token_service: Arc::clone(token_service),
        }
    }
}
