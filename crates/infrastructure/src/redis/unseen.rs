//! 未读计数的 Redis 实现
//!
//! 键格式 `unseen:<role>:<conversation_id>`，按接收方角色隔离同一
//! 会话两侧的计数。INCR 的原子性保证多实例并发自增不丢计数。

use application::{ApplicationError, UnseenCountStore};
use async_trait::async_trait;
use domain::ActorRole;
use redis::aio::MultiplexedConnection;
use tracing::debug;

/// Redis 未读计数存储
#[derive(Clone)]
pub struct RedisUnseenCountStore {
    connection: MultiplexedConnection,
}

impl RedisUnseenCountStore {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }

    fn key(role: ActorRole, conversation_id: &str) -> String {
        format!("unseen:{}:{}", role, conversation_id)
    }
}

#[async_trait]
impl UnseenCountStore for RedisUnseenCountStore {
    async fn increment(
        &self,
        role: ActorRole,
        conversation_id: &str,
    ) -> Result<i64, ApplicationError> {
        let mut conn = self.connection.clone();
        let count: i64 = redis::cmd("INCR")
            .arg(Self::key(role, conversation_id))
            .query_async(&mut conn)
            .await
            .map_err(crate::redis::RedisError::from)?;

        debug!(role = %role, conversation_id, count, "未读计数已自增");
        Ok(count)
    }

    async fn clear(&self, role: ActorRole, conversation_id: &str) -> Result<(), ApplicationError> {
        let mut conn = self.connection.clone();
        // DEL 幂等，键不存在时同样返回成功
        redis::cmd("DEL")
            .arg(Self::key(role, conversation_id))
            .query_async::<()>(&mut conn)
            .await
            .map_err(crate::redis::RedisError::from)?;

        Ok(())
    }

    async fn read(&self, role: ActorRole, conversation_id: &str) -> Result<i64, ApplicationError> {
        let mut conn = self.connection.clone();
        let count: Option<i64> = redis::cmd("GET")
            .arg(Self::key(role, conversation_id))
            .query_async(&mut conn)
            .await
            .map_err(crate::redis::RedisError::from)?;

        // 键不存在读作 0
        Ok(count.unwrap_or(0))
    }
}
