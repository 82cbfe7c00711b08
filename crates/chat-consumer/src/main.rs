//! 消息落库消费者服务
//!
//! 订阅 Kafka 消息主题，把解码后的消息交给批量落库器，按时间
//! 窗口批量写入 PostgreSQL。未读计数由路由侧在消息发送时自增，
//! 本服务只负责持久化。

use std::sync::Arc;
use std::time::Duration;

use application::{BatcherConfig, MessageBatcher};
use config::AppConfig;
use domain::ChatMessage;
use infrastructure::{create_pg_pool, ChatMessageConsumer, PgMessageStore};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();
    config.validate()?;

    // 数据库连接池与迁移
    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;
    info!("数据库连接与迁移完成");

    // 批量落库器
    let store = Arc::new(PgMessageStore::new(pg_pool));
    let batcher = MessageBatcher::new(
        store,
        BatcherConfig {
            flush_interval: Duration::from_millis(config.consumer.flush_interval_ms),
            channel_capacity: config.consumer.channel_capacity,
        },
    )
    .start();

    // Kafka 消费者，通道模式
    let consumer = ChatMessageConsumer::new(&config.kafka)?;
    let (mut records, consumer_handle) = consumer.start_with_channel()?;

    info!(
        topic = %config.kafka.chat_messages_topic,
        group = %config.kafka.consumer_group_id,
        "消息落库消费者已启动"
    );

    loop {
        tokio::select! {
            maybe = records.recv() => match maybe {
                Some(payload) => {
                    let message = ChatMessage::from(payload);
                    if let Err(err) = batcher.submit(message).await {
                        error!(error = %err, "提交消息到落库器失败");
                        break;
                    }
                }
                None => {
                    warn!("消费通道已关闭");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("收到关闭信号，开始优雅关停");
                break;
            }
        }
    }

    // 先停消费再刷余量，停止顺序保证不丢已拉取的消息
    if tokio::time::timeout(Duration::from_secs(5), consumer_handle.stop())
        .await
        .is_err()
    {
        warn!("消费任务未在超时内退出，放弃等待");
    }
    while let Ok(payload) = records.try_recv() {
        if let Err(err) = batcher.submit(ChatMessage::from(payload)).await {
            error!(error = %err, "关停期间提交消息失败");
            break;
        }
    }
    batcher.stop().await;

    info!("消息落库消费者已退出");
    Ok(())
}
