use crate::error::{api_error::ApiError, game_error::GameError};
use crate::model::identity::Identity;
use crate::state::limit_state::LimitState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::IntoResponse;
use std::net::{IpAddr, SocketAddr};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// 已认证的按 userId 限流，匿名的按来源 IP。
/// 直连地址是受信代理时才看 X-Forwarded-For，从右往左跳过受信的代理，
/// 取第一个不受信的地址；否则只认直连地址
pub fn caller_key(
    identity: Option<&Identity>,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: &[IpAddr],
) -> String {
    if let Some(identity) = identity {
        return identity.user_id.clone();
    }
    let Some(peer) = peer.map(|addr| addr.ip()) else {
        return "ip:unknown".to_string();
    };
    if !trusted_proxies.contains(&peer) {
        return format!("ip:{peer}");
    }
    let client = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|hop| hop.trim().parse::<IpAddr>())
        .take_while(Result::is_ok)
        .flatten()
        .find(|hop| !trusted_proxies.contains(hop));
    format!("ip:{}", client.unwrap_or(peer))
}

pub async fn rate_limit(
    State(state): State<LimitState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let key = caller_key(
        request.extensions().get::<Identity>(),
        request.headers(),
        peer.map(|ConnectInfo(addr)| addr),
        &state.trusted_proxies,
    );
    let decision = state
        .rate_limiter
        .allow(&key, state.operation.as_str(), &state.rules)
        .await;
    if !decision.allowed {
        return Err(GameError::RateLimited {
            retry_after: decision.retry_after,
        }
        .into());
    }
    Ok(next.run(request).await)
}
