//! Kafka 适配器模块
//!
//! 提供消息生产者（路由器侧）和消费者（落库侧）实现。

pub mod consumer;
pub mod error;
pub mod producer;

pub use consumer::{ChatMessageConsumer, ConsumerHandle};
pub use error::{KafkaError, KafkaResult};
pub use producer::ChatMessageProducer;
