use crate::config::game_config::GameConfig;
use crate::middleware::auth as auth_middleware;
use crate::model::rate_limit::Operation;
use crate::repository::game_repository::GameRepository;
use crate::routes::{admin, daily, leaderboard, score, session};
use crate::service::daily_challenge_service::DailyChallengeService;
use crate::service::rank_service::RankService;
use crate::service::rate_limiter::RateLimiter;
use crate::service::score_service::ScoreService;
use crate::service::token_service::TokenService;
use crate::service::user_service::UserService;
use crate::state::admin_state::AdminState;
use crate::state::auth_state::AuthState;
use crate::state::limit_state::LimitState;
use crate::state::query_state::QueryState;
use crate::state::score_state::ScoreState;
use crate::state::session_state::SessionState;
use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 路由需要的服务集合，启动时组装一次
#[derive(Clone)]
pub struct AppContext {
    pub game_repo: GameRepository,
    pub config: Arc<GameConfig>,
    pub rate_limiter: RateLimiter,
    pub rank_service: RankService,
    pub score_service: Arc<ScoreService>,
    pub user_service: Arc<UserService>,
    pub daily_service: Arc<DailyChallengeService>,
    pub token_service: Arc<TokenService>,
    pub admin_secret: String,
}

pub fn app(ctx: &AppContext) -> Router {
    let merged_router = {
        let auth_state = AuthState::new(&ctx.token_service);
        let query_limit = LimitState::new(&ctx.rate_limiter, &ctx.config, Operation::Query);
        let trigger_limit = LimitState::new(&ctx.rate_limiter, &ctx.config, Operation::Trigger);
        let query_state = QueryState::new(&ctx.game_repo, &ctx.rank_service);
        let admin_state =
            AdminState::new(&ctx.daily_service, &ctx.rank_service, &ctx.admin_secret);

        // 提交、建档都需要身份
        let authed = Router::new()
            .merge(session::routes().with_state(SessionState::new(&ctx.user_service)))
            .merge(score::routes().with_state(ScoreState::new(&ctx.score_service)))
            .route_layer(middleware::from_fn_with_state(
                auth_state.clone(),
                auth_middleware::auth,
            ));

        Router::new()
            .merge(authed)
            .merge(leaderboard::routes(&auth_state, &query_limit).with_state(query_state.clone()))
            .merge(daily::routes(&query_limit).with_state(query_state))
            .merge(admin::routes(&admin_state, &trigger_limit).with_state(admin_state.clone()))
            .merge(Router::new().route("/health", get(|| async move { "Healthy..." })))
    };

    Router::new()
        .nest("/api", merged_router)
        .layer(TraceLayer::new_for_http())
}

pub fn routes(ctx: &AppContext) -> IntoMakeServiceWithConnectInfo<Router, SocketAddr> {
    app(ctx).into_make_service_with_connect_info::<SocketAddr>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::store::SharedStore;
    use crate::repository::game_repository::GameRepositoryTrait;
    use crate::model::rate_limit::RateRule;
    use crate::service::event_bus::EventBus;
    use crate::service::level_generator::SeedOnlyLevelGenerator;
    use crate::service::token_service::tests::issue;
    use crate::utils::encrypt;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const JWT_SECRET: &str = "jwt-secret";
    const ADMIN_SECRET: &str = "admin-secret";

    fn context(config: GameConfig) -> AppContext {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let game_repo = GameRepository::new(&store);
        let config = Arc::new(config);
        let (bus, _events) = EventBus::channel(64);
        let rate_limiter = RateLimiter::new(&game_repo, config.store_max_retries);
        let rank_service = RankService::new(&game_repo, &bus, &config);
        let score_service = Arc::new(ScoreService::new(
            &game_repo,
            &rate_limiter,
            &rank_service,
            &config,
        ));
        let user_service = Arc::new(UserService::new(&game_repo, &rate_limiter, &config));
        let daily_service = Arc::new(DailyChallengeService::new(
            &game_repo,
            Arc::new(SeedOnlyLevelGenerator),
            &bus,
            config.store_max_retries,
        ));
        AppContext {
            game_repo,
            config,
            rate_limiter,
            rank_service,
            score_service,
            user_service,
            daily_service,
            token_service: Arc::new(TokenService::new(JWT_SECRET)),
            admin_secret: ADMIN_SECRET.to_string(),
        }
    }

    fn bearer(user_id: &str) -> String {
        format!("Bearer {}", issue(JWT_SECRET, user_id, user_id, 600))
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn signed(uri: &str, body: Value, secret: &str) -> Request<Body> {
        let raw = body.to_string();
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("signature", encrypt::body_signature(&raw, secret))
            .body(Body::from(raw))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// 模拟从 peer 直连、带着 X-Forwarded-For 的匿名查询
    fn top_from(peer: &str, forwarded: &str) -> Request<Body> {
        let mut request = Request::builder()
            .uri("/api/leaderboard/top?limit=10")
            .header("x-forwarded-for", forwarded)
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app(&context(GameConfig::default()));
        let response = app.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_requires_identity() {
        let app = app(&context(GameConfig::default()));
        let body = json!({ "levelId": 1, "stars": 2, "timeMs": 1000 });
        let response = app
            .oneshot(post_json("/api/score/submit", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_submit_and_leaderboard_flow() {
        let app = app(&context(GameConfig::default()));
        let token = bearer("u1");

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/session",
                Some(token.as_str()),
                json!({ "deviceToken": "device-1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/score/submit",
                Some(token.as_str()),
                json!({ "levelId": 1, "stars": 3, "timeMs": 4200 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["accepted"], true);
        assert_eq!(body["data"]["newRank"], 1);

        let response = app
            .clone()
            .oneshot(get("/api/leaderboard/top?limit=10"))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["data"][0]["userId"], "u1");
        assert_eq!(body["data"][0]["totalStars"], 3);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/leaderboard/me")
                    .header(header::AUTHORIZATION, &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["data"]["rank"], 1);
    }

    #[tokio::test]
    async fn invalid_stars_are_bad_requests() {
        let app = app(&context(GameConfig::default()));
        let response = app
            .oneshot(post_json(
                "/api/score/submit",
                Some(&bearer("u1")),
                json!({ "levelId": 1, "stars": 9, "timeMs": 1000 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rate_limited_submission_carries_retry_after() {
        let app = app(&context(GameConfig {
            submit_rules: vec![RateRule::new(1, Duration::from_secs(60))],
            ..Default::default()
        }));
        let token = bearer("u1");
        let body = json!({ "levelId": 1, "stars": 1, "timeMs": 1000 });

        let first = app
            .clone()
            .oneshot(post_json("/api/score/submit", Some(token.as_str()), body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(post_json("/api/score/submit", Some(token.as_str()), body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = second.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
    }

    #[tokio::test]
    async fn admin_generate_checks_signature_and_is_idempotent() {
        let app = app(&context(GameConfig::default()));
        let body = json!({ "date": "2026-03-14" });

        let rejected = app
            .clone()
            .oneshot(signed("/api/admin/daily/generate", body.clone(), "wrong"))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

        let first = app
            .clone()
            .oneshot(signed("/api/admin/daily/generate", body.clone(), ADMIN_SECRET))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(json_body(first).await["data"]["created"], true);

        let second = app
            .clone()
            .oneshot(signed("/api/admin/daily/generate", body, ADMIN_SECRET))
            .await
            .unwrap();
        assert_eq!(json_body(second).await["data"]["created"], false);

        let response = app.oneshot(get("/api/daily/2026-03-14")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let challenge = json_body(response).await;
        assert_eq!(challenge["data"]["ready"], true);
    }

    #[tokio::test]
    async fn unknown_daily_is_not_found() {
        let app = app(&context(GameConfig::default()));
        for uri in ["/api/daily/2026-01-01", "/api/daily/not-a-date/entries"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn rotating_forwarded_for_does_not_escape_query_limit() {
        let app = app(&context(GameConfig {
            query_rules: vec![RateRule::new(2, Duration::from_secs(60))],
            ..Default::default()
        }));
        let mut statuses = vec![];
        for i in 0..10 {
            let forwarded = format!("203.0.113.{i}");
            let response = app
                .clone()
                .oneshot(top_from("198.51.100.4:40000", &forwarded))
                .await
                .unwrap();
            statuses.push(response.status());
        }
        assert_eq!(statuses[..2], [StatusCode::OK, StatusCode::OK]);
        assert!(statuses[2..]
            .iter()
            .all(|status| *status == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn trusted_proxy_clients_are_limited_separately() {
        let app = app(&context(GameConfig {
            query_rules: vec![RateRule::new(1, Duration::from_secs(60))],
            trusted_proxies: vec!["10.0.0.1".parse().unwrap()],
            ..Default::default()
        }));
        let first = app
            .clone()
            .oneshot(top_from("10.0.0.1:8080", "203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let other = app
            .clone()
            .oneshot(top_from("10.0.0.1:8080", "203.0.113.2"))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::OK);
        let again = app
            .oneshot(top_from("10.0.0.1:8080", "203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
