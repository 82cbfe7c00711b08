//! 聊天服务主入口
//!
//! 装配 Redis / Kafka / PostgreSQL 适配器并启动 Axum 服务，
//! 同一进程承载 HTTP API 和 WebSocket 消息路由。

use std::sync::Arc;

use application::{
    ChatRouter, ConnectionRegistry, ConversationRepository, MessageQueue, MessageStore,
    PresenceStore, UnseenCountStore,
};
use config::AppConfig;
use infrastructure::{
    connect_redis, create_pg_pool, ChatMessageProducer, PgConversationRepository, PgMessageStore,
    RedisPresenceStore, RedisUnseenCountStore,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();
    config.validate()?;

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    // PostgreSQL 连接池与迁移
    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    // Redis 适配器：在线标记与未读计数共用一条多路复用连接
    let redis_connection = connect_redis(&config.redis.url).await?;
    let presence: Arc<dyn PresenceStore> = Arc::new(RedisPresenceStore::new(
        redis_connection.clone(),
        config.redis.presence_ttl_seconds,
    ));
    let unseen_counts: Arc<dyn UnseenCountStore> =
        Arc::new(RedisUnseenCountStore::new(redis_connection));

    // Kafka 生产者
    let queue: Arc<dyn MessageQueue> = Arc::new(ChatMessageProducer::new(&config.kafka)?);

    // 连接注册表与消息路由器
    let registry = Arc::new(ConnectionRegistry::new(presence.clone()));
    let chat_router = Arc::new(ChatRouter::new(registry, unseen_counts.clone(), queue));

    // 数据访问
    let conversations: Arc<dyn ConversationRepository> =
        Arc::new(PgConversationRepository::new(pg_pool.clone()));
    let messages: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(pg_pool));

    let state = AppState::new(chat_router, presence, unseen_counts, conversations, messages);

    // 启动 Web 服务器
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("聊天服务启动在 http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
