use crate::config::game_config::{GameConfig, RankMode};
use crate::config::parameter;
use crate::db::memory_store::MemoryStore;
use crate::db::mysql_store::MySqlStore;
use crate::db::redis_store::RedisStore;
use crate::db::store::SharedStore;
use crate::db::{
    axredis,
    database::{self, DatabaseTrait},
};
use crate::repository::game_repository::{GameRepository, GameRepositoryTrait};
use crate::routes::root::AppContext;
use crate::service::daily_challenge_service::DailyChallengeService;
use crate::service::event_bus::{EventBus, EVENT_QUEUE_CAPACITY};
use crate::service::level_generator::{HttpLevelGenerator, LevelGenerator, SeedOnlyLevelGenerator};
use crate::service::notification_service::NotificationService;
use crate::service::push_transport::{HttpPushTransport, LogPushTransport, PushTransport};
use crate::service::rank_service::RankService;
use crate::service::rate_limiter::RateLimiter;
use crate::service::scheduler_service::SchedulerService;
use crate::service::score_service::ScoreService;
use crate::service::token_service::TokenService;
use crate::service::user_service::UserService;

use tokio_cron_scheduler::JobScheduler;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::sync::Arc;

mod config;
mod db;
mod dto;
mod error;
mod handler;
mod middleware;
mod model;
mod repository;
mod response;
mod routes;
mod service;
mod state;
mod utils;

// 内存分配器
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[cfg(target_env = "msvc")]
use mimalloc::MiMalloc;

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 按 STORE_BACKEND 选择存储
async fn init_store() -> SharedStore {
    match parameter::get_or("STORE_BACKEND", "memory").as_str() {
        "mysql" => {
            let connection = database::Database::init()
                .await
                .unwrap_or_else(|e| panic!("Database error: {}", e.to_string()));
            let store = MySqlStore::new(&Arc::new(connection));
            store
                .init_schema()
                .await
                .unwrap_or_else(|e| panic!("Database schema error: {}", e.to_string()));
            Arc::new(store)
        }
        "redis" => {
            let pool = axredis::init_redis_pool()
                .await
                .unwrap_or_else(|err| panic!("redis init failed, error:{}", err.to_string()));
            Arc::new(RedisStore::new(&pool))
        }
        "memory" => {
            tracing::warn!("using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        other => panic!("config -- unknown STORE_BACKEND `{}`", other),
    }
}

#[tokio::main]
async fn main() {
    // 参数初始化
    parameter::init();

    // 日志
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("logger")
        .filename_suffix("log")
        .max_log_files(60)
        .build("log")
        .expect("file log init failed!");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let file_log_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_timer(time::LocalTime::rfc_3339());

    let console_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_timer(time::LocalTime::rfc_3339());
    tracing_subscriber::registry()
        .with(file_log_subscriber)
        .with(console_subscriber)
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Arc::new(
        GameConfig::from_env().unwrap_or_else(|err| panic!("config error: {}", err)),
    );
    let store = init_store().await;
    let game_repo = GameRepository::new(&store);

    // 事件总线：排名变化、每日挑战创建 -> 推送
    let (event_bus, event_receiver) = EventBus::channel(EVENT_QUEUE_CAPACITY);
    let push_transport: Arc<dyn PushTransport> = match parameter::get_opt("PUSH_ENDPOINT") {
        Some(endpoint) => Arc::new(
            HttpPushTransport::new(&endpoint)
                .unwrap_or_else(|err| panic!("push transport init failed, error:{}", err)),
        ),
        None => Arc::new(LogPushTransport),
    };
    let notification_service = Arc::new(NotificationService::new(
        &game_repo,
        push_transport,
        config.rank_notify_threshold,
        &config.push_daily_topic,
        config.store_max_retries,
    ));
    let _dispatcher = notification_service.spawn(event_receiver);

    let level_generator: Arc<dyn LevelGenerator> = match parameter::get_opt("LEVEL_GENERATOR_URL") {
        Some(url) => Arc::new(
            HttpLevelGenerator::new(&url)
                .unwrap_or_else(|err| panic!("level generator init failed, error:{}", err)),
        ),
        None => Arc::new(SeedOnlyLevelGenerator),
    };

    let rate_limiter = RateLimiter::new(&game_repo, config.store_max_retries);
    let rank_service = RankService::new(&game_repo, &event_bus, &config);
    let score_service = Arc::new(ScoreService::new(
        &game_repo,
        &rate_limiter,
        &rank_service,
        &config,
    ));
    let user_service = Arc::new(UserService::new(&game_repo, &rate_limiter, &config));
    let daily_service = Arc::new(DailyChallengeService::new(
        &game_repo,
        level_generator,
        &event_bus,
        config.store_max_retries,
    ));

    if parameter::has_flag("--recompute_ranks") {
        match rank_service.recompute_global_ranks().await {
            Ok(report) => tracing::info!(
                "startup recompute - total:{} | written:{}",
                report.total,
                report.written
            ),
            Err(err) => tracing::error!("startup recompute - error:{}", err),
        }
    }

    // 启动时补一次当天的每日挑战，错过了零点任务也能恢复
    match daily_service.generate_for_today().await {
        Ok(outcome) => tracing::info!(
            "startup daily challenge - date:{} | created:{} | ready:{}",
            outcome.date,
            outcome.created,
            outcome.ready
        ),
        Err(err) => tracing::error!("startup daily challenge - error:{}", err),
    }

    let sched = JobScheduler::new().await.unwrap();
    let scheduler_service = SchedulerService::new(&sched, &daily_service, &rank_service, &config);
    scheduler_service
        .start()
        .await
        .unwrap_or_else(|err| panic!("scheduler start failed, error:{}", err));

    let host = format!("0.0.0.0:{}", parameter::get_or("PORT", "8080"));
    let listener = tokio::net::TcpListener::bind(host).await.unwrap();

    tracing::info!(
        "listening on {} | rank_mode: {}",
        listener.local_addr().unwrap(),
        if config.rank_mode == RankMode::Batch { "batch" } else { "incremental" }
    );

    let ctx = AppContext {
        game_repo,
        config: Arc::clone(&config),
        rate_limiter,
        rank_service,
        score_service,
        user_service,
        daily_service,
        token_service: Arc::new(TokenService::new(&parameter::get("JWT_SECRET"))),
        admin_secret: parameter::get("ADMIN_SECRET"),
    };
    axum::serve(listener, routes::root::routes(&ctx))
        .await
        .unwrap_or_else(|e| panic!("Server error: {}", e.to_string()));
}
