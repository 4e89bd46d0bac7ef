/// 身份提供方认证过的调用者，userId 原样信任
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}
