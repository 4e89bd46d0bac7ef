use crate::config::parameter;
use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{Error, MySql, Pool};

pub struct Database {
    master_pool: Pool<MySql>,
    slave_pool: Pool<MySql>,
}

#[async_trait]
pub trait DatabaseTrait {
    async fn init() -> Result<Self, Error>
    where
        Self: Sized;
    fn get_master_pool(&self) -> &Pool<MySql>;
    fn get_slave_pool(&self) -> &Pool<MySql>;
}

async fn connect(database_url: &str) -> Result<Pool<MySql>, Error> {
    MySqlPoolOptions::new()
        .max_connections(10)
        .max_lifetime(std::time::Duration::from_secs(6 * 60 * 60))
        .connect(database_url)
        .await
}

#[async_trait]
impl DatabaseTrait for Database {
    async fn init() -> Result<Self, Error> {
        let database_url = parameter::get("MASTER_DB_URL");
        let master_pool = connect(&database_url).await?;
        // 没有配置从库时读写都走主库
        let slave_pool = match parameter::get_opt("SLAVE_DB_URL") {
            Some(slave_database_url) => connect(&slave_database_url).await?,
            None => master_pool.clone(),
        };

        Ok(Self {
            master_pool,
            slave_pool,
        })
    }

    fn get_master_pool(&self) -> &Pool<MySql> {
        &self.master_pool
    }

    fn get_slave_pool(&self) -> &Pool<MySql> {
        &self.slave_pool
    }
}
