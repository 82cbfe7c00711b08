//! 聊天消息实体定义
//!
//! 消息归属于其会话，持久化后不可变（当前范围不支持编辑/删除）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorRole;
use crate::errors::{DomainError, DomainResult};
use crate::wire::MessagePayload;

/// 聊天消息实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_type: ActorRole,
    pub content: String,
    /// 附件 URL 列表，缺省为空
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// 创建新消息，校验必填字段
    pub fn new(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_type: ActorRole,
        content: impl Into<String>,
    ) -> DomainResult<Self> {
        let conversation_id = conversation_id.into();
        let sender_id = sender_id.into();
        let content = content.into();

        if conversation_id.is_empty() {
            return Err(DomainError::validation_error(
                "conversation_id",
                "会话 ID 不能为空",
            ));
        }
        if sender_id.is_empty() {
            return Err(DomainError::validation_error("sender_id", "发送者 ID 不能为空"));
        }
        if content.is_empty() {
            return Err(DomainError::message_error("消息内容不能为空"));
        }

        Ok(Self {
            conversation_id,
            sender_id,
            sender_type,
            content,
            attachments: Vec::new(),
            created_at: Utc::now(),
        })
    }

    /// 消息在队列/线上协议中的负载形式
    pub fn to_payload(&self) -> MessagePayload {
        MessagePayload {
            conversation_id: self.conversation_id.clone(),
            sender_id: self.sender_id.clone(),
            sender_type: self.sender_type,
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

impl From<MessagePayload> for ChatMessage {
    /// 从队列记录还原消息，附件缺省为空
    fn from(payload: MessagePayload) -> Self {
        Self {
            conversation_id: payload.conversation_id,
            sender_id: payload.sender_id,
            sender_type: payload.sender_type,
            content: payload.content,
            attachments: Vec::new(),
            created_at: payload.created_at,
        }
    }
}
