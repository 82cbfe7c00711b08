//! WebSocket 线上协议帧定义
//!
//! 客户端与服务端之间的 JSON 消息格式，以及发往持久化队列的
//! 消息负载。字段名一律使用 camelCase 以兼容既有客户端。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorRole;

/// 客户端入站帧
///
/// 未注册连接发来的首个无法按此结构解析的帧被当作
/// 裸身份串（`user_<id>` / `seller_<id>`）处理，见路由器。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    /// 带 `type` 判别字段的控制帧
    Control(ControlFrame),
    /// 普通聊天消息（无 `type` 字段）
    Chat(ChatSendFrame),
}

/// 控制帧
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlFrame {
    /// 显式注册帧，任意状态下都接受，后连接覆盖先连接
    #[serde(rename = "REGISTER", rename_all = "camelCase")]
    Register { actor_id: String },
    /// 清零指定会话的未读计数
    #[serde(rename = "MARK_AS_SEEN", rename_all = "camelCase")]
    MarkAsSeen { conversation_id: String },
}

/// 聊天发送帧
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendFrame {
    pub from_user_id: String,
    pub to_user_id: String,
    pub conversation_id: String,
    pub message_body: String,
    pub sender_type: ActorRole,
}

/// 服务端出站事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    /// 新消息投递（接收方与发送方回显共用）
    #[serde(rename = "NEW_MESSAGE")]
    NewMessage(MessagePayload),
    /// 未读计数变更通知
    #[serde(rename = "UNSEEN_COUNT_UPDATE")]
    UnseenCountUpdate(UnseenCountPayload),
}

/// 消息负载
///
/// 同时作为 `NEW_MESSAGE` 事件内容和 Kafka 队列记录的值，
/// 队列记录以 `conversationId` 为分区键。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_type: ActorRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// 未读计数负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnseenCountPayload {
    pub conversation_id: String,
    pub count: i64,
}
