//! Kafka 消息消费者
//!
//! 作为消费者组成员订阅消息主题，把解码后的消息负载推入通道，
//! 由落库侧消费。支持优雅关闭和接收错误的指数退避恢复。

use domain::MessagePayload;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::kafka::{KafkaError, KafkaResult};
use config::KafkaConfig;

/// Kafka 消息消费者
pub struct ChatMessageConsumer {
    consumer: StreamConsumer,
    topic: String,
}

/// 后台消费任务的关闭句柄
pub struct ConsumerHandle {
    shutdown: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl ConsumerHandle {
    /// 请求停止并等待消费循环退出
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Err(err) = self.join.await {
            error!(error = %err, "消费任务异常退出");
        }
    }
}

impl ChatMessageConsumer {
    /// 创建新的 Kafka 消费者
    pub fn new(config: &KafkaConfig) -> KafkaResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("group.id", &config.consumer_group_id)
            .set("bootstrap.servers", config.brokers.join(","))
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "10000")
            .set("heartbeat.interval.ms", "3000")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "1000")
            .set("auto.offset.reset", "latest");

        let consumer: StreamConsumer =
            client_config
                .create()
                .map_err(|e| KafkaError::ConfigError {
                    message: format!("创建 Kafka 消费者失败: {}", e),
                })?;

        info!(
            "Kafka 消费者创建成功，消费者组: {}",
            config.consumer_group_id
        );

        Ok(Self {
            consumer,
            topic: config.chat_messages_topic.clone(),
        })
    }

    /// 订阅主题并启动后台消费循环，返回消息通道和关闭句柄
    pub fn start_with_channel(
        self,
    ) -> KafkaResult<(mpsc::UnboundedReceiver<MessagePayload>, ConsumerHandle)> {
        self.consumer
            .subscribe(&[&self.topic])
            .map_err(|e| KafkaError::ConsumerError {
                message: format!("订阅主题失败: {}", e),
            })?;

        info!("已订阅主题: {}，开始通道模式消费", self.topic);

        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_signal = Arc::clone(&shutdown);
        let consumer = self.consumer;

        let join = tokio::spawn(async move {
            Self::consume_loop(consumer, shutdown_signal, sender).await;
        });

        Ok((receiver, ConsumerHandle { shutdown, join }))
    }

    async fn consume_loop(
        consumer: StreamConsumer,
        shutdown_signal: Arc<AtomicBool>,
        sender: mpsc::UnboundedSender<MessagePayload>,
    ) {
        let mut retry_count = 0;
        const MAX_RETRIES: u32 = 5;

        while !shutdown_signal.load(Ordering::Relaxed) {
            match consumer.recv().await {
                Ok(message) => {
                    retry_count = 0;

                    if let Err(e) = Self::forward_message(&message, &sender) {
                        // 畸形记录只记日志跳过，不中断消费
                        error!("处理消息失败: {}", e);
                    }
                }
                Err(e) => {
                    error!("接收消息失败: {}", e);
                    retry_count += 1;

                    if retry_count >= MAX_RETRIES {
                        error!("达到最大重试次数，停止消费");
                        break;
                    }

                    let delay = Duration::from_millis(1000 * (2_u64.pow(retry_count - 1)));
                    warn!("等待 {:?} 后重试...", delay);
                    sleep(delay).await;
                }
            }
        }

        info!("消费循环已停止");
    }

    fn forward_message(
        message: &BorrowedMessage<'_>,
        sender: &mpsc::UnboundedSender<MessagePayload>,
    ) -> KafkaResult<()> {
        let payload = message
            .payload()
            .ok_or_else(|| KafkaError::DeserializationError {
                message: "消息负载为空".to_string(),
            })?;

        let payload: MessagePayload =
            serde_json::from_slice(payload).map_err(|e| KafkaError::DeserializationError {
                message: format!("反序列化消息失败: {}", e),
            })?;

        debug!(
            conversation_id = %payload.conversation_id,
            partition = message.partition(),
            offset = message.offset(),
            "接收到消息记录"
        );

        if sender.send(payload).is_err() {
            warn!("发送消息到通道失败，接收端可能已关闭");
        }

        Ok(())
    }
}
