//! 在线标记的 Redis 实现
//!
//! 键格式统一为 `online:<role>:<id>`，值恒为 "1"，注册时带 TTL
//! 写入。TTL 是进程崩溃后标记自动过期的兜底，正常断连走 DEL。

use application::{ApplicationError, PresenceStore};
use async_trait::async_trait;
use domain::ActorId;
use redis::aio::MultiplexedConnection;
use tracing::debug;

/// Redis 在线标记存储
#[derive(Clone)]
pub struct RedisPresenceStore {
    connection: MultiplexedConnection,
    ttl_seconds: u64,
}

impl RedisPresenceStore {
    pub fn new(connection: MultiplexedConnection, ttl_seconds: u64) -> Self {
        Self {
            connection,
            ttl_seconds,
        }
    }

    fn key(actor: &ActorId) -> String {
        format!("online:{}:{}", actor.role, actor.id)
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn mark_online(&self, actor: &ActorId) -> Result<(), ApplicationError> {
        let mut conn = self.connection.clone();
        redis::cmd("SET")
            .arg(Self::key(actor))
            .arg("1")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async::<()>(&mut conn)
            .await
            .map_err(crate::redis::RedisError::from)?;

        debug!(actor = %actor, ttl = self.ttl_seconds, "在线标记已写入");
        Ok(())
    }

    async fn mark_offline(&self, actor: &ActorId) -> Result<(), ApplicationError> {
        let mut conn = self.connection.clone();
        redis::cmd("DEL")
            .arg(Self::key(actor))
            .query_async::<()>(&mut conn)
            .await
            .map_err(crate::redis::RedisError::from)?;

        debug!(actor = %actor, "在线标记已清除");
        Ok(())
    }

    async fn is_online(&self, actor: &ActorId) -> Result<bool, ApplicationError> {
        let mut conn = self.connection.clone();
        let exists: i64 = redis::cmd("EXISTS")
            .arg(Self::key(actor))
            .query_async(&mut conn)
            .await
            .map_err(crate::redis::RedisError::from)?;

        Ok(exists == 1)
    }
}
