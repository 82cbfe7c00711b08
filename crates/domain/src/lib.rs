//! 领域模型层。
//!
//! 定义聊天管道的核心实体（会话组、参与者、消息）、参与者身份
//! 以及 WebSocket 线上协议的帧类型。

pub mod actor;
pub mod conversation;
pub mod errors;
pub mod message;
pub mod wire;

pub use actor::{ActorId, ActorRole};
pub use conversation::{ConversationGroup, Participant};
pub use errors::{DomainError, DomainResult};
pub use message::ChatMessage;
pub use wire::{ChatSendFrame, ClientFrame, ControlFrame, MessagePayload, ServerEvent, UnseenCountPayload};
