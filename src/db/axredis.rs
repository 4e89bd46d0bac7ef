use crate::config::parameter;
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};

/// 创建redis连接池，并做一次连接测试
pub async fn init_redis_pool() -> Result<Pool, String> {
    let redis_url = parameter::get("REDIS_URL");

    let mut cfg = Config::from_url(redis_url);
    cfg.pool = Some(PoolConfig::new(10));
    let pool = cfg
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|err| err.to_string())?;
    // 创建好连接池进行获取连接测试
    pool.get().await.map_err(|err| err.to_string())?;
    Ok(pool)
}
