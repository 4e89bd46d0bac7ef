use crate::service::user_service::UserService;
use std::sync::Arc;

#[derive(Clone)]
pub struct SessionState {
    pub user_service: Arc<UserService>,
}

impl SessionState {
    pub fn new(user_service: &Arc<UserService>) -> Self {
        Self {
            user_service: Arc::clone(user_service),
        }
    }
}
