//! 应用层实现。
//!
//! 这里提供聊天管道的用例逻辑：连接注册、消息路由、批量摄取，
//! 以及对外部适配器（Redis、Kafka、PostgreSQL）的抽象端口。

pub mod batcher;
pub mod error;
pub mod ports;
pub mod registry;
pub mod router;

pub use batcher::{BatcherConfig, BatcherHandle, MessageBatcher};
pub use error::ApplicationError;
pub use ports::{ConversationRepository, MessageQueue, MessageStore, PresenceStore, UnseenCountStore};
pub use registry::{ConnectionRegistry, ConnectionSender};
pub use router::{ChatRouter, ConnectionSession};
