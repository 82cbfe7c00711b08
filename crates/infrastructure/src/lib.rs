//! 基础设施层实现。
//!
//! 提供 Redis 在线标记/未读计数、Kafka 生产消费、PostgreSQL
//! 持久化等适配器，实现应用层定义的端口。

pub mod db;
pub mod kafka;
pub mod redis;

pub use self::db::{create_pg_pool, DbPool, PgConversationRepository, PgMessageStore};
pub use self::kafka::{ChatMessageConsumer, ChatMessageProducer, ConsumerHandle, KafkaError};
pub use self::redis::{connect_redis, RedisError, RedisPresenceStore, RedisUnseenCountStore};
