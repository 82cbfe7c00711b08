//! Kafka 消息生产者
//!
//! 使用会话 ID 作为分区键，确保同一会话消息的有序性。

use application::{ApplicationError, MessageQueue};
use async_trait::async_trait;
use config::KafkaConfig;
use domain::MessagePayload;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::kafka::{KafkaError, KafkaResult};

/// Kafka 消息生产者
pub struct ChatMessageProducer {
    producer: FutureProducer,
    topic: String,
    send_timeout_ms: u32,
    retry_count: u32,
}

impl ChatMessageProducer {
    /// 创建新的 Kafka 生产者
    pub fn new(config: &KafkaConfig) -> KafkaResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", config.brokers.join(","))
            .set("message.timeout.ms", config.send_timeout_ms.to_string())
            .set("acks", &config.acks)
            .set("retries", config.retry_count.to_string())
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "5");

        let producer: FutureProducer =
            client_config
                .create()
                .map_err(|e| KafkaError::ConfigError {
                    message: format!("创建 Kafka 生产者失败: {}", e),
                })?;

        info!("Kafka 生产者创建成功，连接到: {}", config.brokers.join(","));

        Ok(Self {
            producer,
            topic: config.chat_messages_topic.clone(),
            send_timeout_ms: config.send_timeout_ms,
            retry_count: config.retry_count,
        })
    }

    /// 带重试的发送，指数退避
    async fn send_with_retry(
        &self,
        payload: &str,
        partition_key: &str,
        retry_count: u32,
    ) -> KafkaResult<()> {
        let record = FutureRecord::to(&self.topic)
            .payload(payload)
            .key(partition_key);

        let timeout = Duration::from_millis(self.send_timeout_ms as u64);

        match self.producer.send(record, Timeout::After(timeout)).await {
            Ok(_) => {
                if retry_count > 0 {
                    info!("消息重试 {} 次后发送成功", retry_count);
                }
                Ok(())
            }
            Err((kafka_err, _)) => {
                if retry_count < self.retry_count {
                    warn!(
                        "消息发送失败，第 {} 次重试: {}",
                        retry_count + 1,
                        kafka_err
                    );

                    let delay = Duration::from_millis(100 * (2_u64.pow(retry_count)));
                    sleep(delay).await;

                    // 使用 Box::pin 来处理递归
                    return Box::pin(self.send_with_retry(
                        payload,
                        partition_key,
                        retry_count + 1,
                    ))
                    .await;
                }

                error!("消息发送失败，已达最大重试次数: {}", kafka_err);
                Err(KafkaError::ProducerError {
                    message: format!("发送失败: {}", kafka_err),
                })
            }
        }
    }

    /// 刷新生产者缓冲区，进程退出前调用
    pub fn flush(&self) -> KafkaResult<()> {
        self.producer
            .flush(Timeout::After(Duration::from_secs(10)))
            .map_err(|e| KafkaError::ProducerError {
                message: format!("刷新生产者缓冲区失败: {}", e),
            })
    }
}

#[async_trait]
impl MessageQueue for ChatMessageProducer {
    async fn publish(&self, payload: &MessagePayload) -> Result<(), ApplicationError> {
        let body = serde_json::to_string(payload).map_err(KafkaError::from)?;

        // 会话 ID 作为分区键
        self.send_with_retry(&body, &payload.conversation_id, 0)
            .await?;
        Ok(())
    }
}
