//! Redis 适配器模块
//!
//! 提供在线标记和未读计数的 Redis 实现。

pub mod error;
pub mod presence;
pub mod unseen;

pub use error::{RedisError, RedisResult};
pub use presence::RedisPresenceStore;
pub use unseen::RedisUnseenCountStore;

use ::redis::aio::MultiplexedConnection;
use ::redis::Client;
use tracing::info;

/// 建立多路复用的 Redis 连接
///
/// 单条连接可被多个克隆并发使用，命令在底层自动排队。
pub async fn connect_redis(url: &str) -> RedisResult<MultiplexedConnection> {
    let client = Client::open(url).map_err(|e| RedisError::ConfigError {
        message: format!("创建 Redis 客户端失败: {}", e),
    })?;

    let connection = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| RedisError::ConnectionError {
            message: format!("连接 Redis 失败: {}", e),
        })?;

    info!("Redis 连接建立成功");
    Ok(connection)
}
