//! PostgreSQL 持久化模块

pub mod conversation_repository;
pub mod message_store;

pub use conversation_repository::PgConversationRepository;
pub use message_store::PgMessageStore;

use application::ApplicationError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

pub type DbPool = Pool<Postgres>;

/// 创建数据库连接池
pub async fn create_pg_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> ApplicationError {
    ApplicationError::storage(err.to_string())
}

pub(crate) fn invalid_data(message: impl Into<String>) -> ApplicationError {
    ApplicationError::storage(message)
}
