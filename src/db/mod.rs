pub mod axredis;
pub mod database;
pub mod memory_store;
pub mod mysql_store;
pub mod redis_store;
pub mod store;
