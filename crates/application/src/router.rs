//! 消息路由器
//!
//! 每条 WebSocket 连接对应的入站帧处理器。连接只有两个状态：
//! 未注册 → 已注册。首个无法按结构帧解析的入站帧被当作裸身份串
//! 完成注册（兼容旧客户端），显式 `REGISTER` 帧在任意状态下都
//! 接受。已注册后的聊天帧经过校验、未读计数自增、本地实时投递、
//! 发送方回显，最终发布到持久化队列。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use domain::{
    ActorId, ChatSendFrame, ClientFrame, ControlFrame, MessagePayload, ServerEvent,
    UnseenCountPayload,
};

use crate::ports::{MessageQueue, UnseenCountStore};
use crate::registry::{ConnectionRegistry, ConnectionSender};

/// 单条连接的会话状态
#[derive(Debug, Default)]
pub struct ConnectionSession {
    actor: Option<ActorId>,
}

impl ConnectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 会话绑定的身份，未注册时为 None
    pub fn actor(&self) -> Option<&ActorId> {
        self.actor.as_ref()
    }
}

/// 消息路由器
///
/// 未读计数归路由器单点自增：共享缓存里的原子 INCR 跑在处理
/// 发送的那个实例上，与接收方连在哪个实例（或是否在线）无关，
/// 每条被接受的消息恰好计数一次。摄取消费者不再重复自增。
pub struct ChatRouter {
    registry: Arc<ConnectionRegistry>,
    unseen_counts: Arc<dyn UnseenCountStore>,
    queue: Arc<dyn MessageQueue>,
}

impl ChatRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        unseen_counts: Arc<dyn UnseenCountStore>,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        Self {
            registry,
            unseen_counts,
            queue,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// 处理一条入站文本帧
    ///
    /// 所有错误在此边界内记日志后吞掉：格式错误的帧被静默丢弃，
    /// 缓存/队列故障只影响当前这条消息，连接始终保持打开。
    pub async fn handle_frame(
        &self,
        session: &mut ConnectionSession,
        raw: &str,
        sender: &ConnectionSender,
    ) {
        match serde_json::from_str::<ClientFrame>(raw) {
            Ok(ClientFrame::Control(control)) => {
                self.handle_control(session, control, sender).await;
            }
            Ok(ClientFrame::Chat(chat)) => {
                if session.actor.is_none() {
                    warn!("未注册连接发来聊天帧，已丢弃");
                    return;
                }
                self.handle_chat(chat).await;
            }
            Err(_) => {
                if session.actor.is_none() {
                    // 旧协议：首个非结构帧就是身份串
                    match raw.trim().parse::<ActorId>() {
                        Ok(actor) => self.register_session(session, actor, sender).await,
                        Err(err) => {
                            warn!(error = %err, "无法识别的注册帧，已丢弃");
                        }
                    }
                } else if let Some(actor) = session.actor.as_ref() {
                    warn!(actor = %actor, "入站帧格式错误，已丢弃");
                }
            }
        }
    }

    /// 连接关闭时解除注册并清除在线标记
    pub async fn disconnect(&self, session: &mut ConnectionSession) {
        if let Some(actor) = session.actor.take() {
            self.registry.unregister(&actor).await;
        }
    }

    async fn handle_control(
        &self,
        session: &mut ConnectionSession,
        control: ControlFrame,
        sender: &ConnectionSender,
    ) {
        match control {
            ControlFrame::Register { actor_id } => match actor_id.parse::<ActorId>() {
                Ok(actor) => self.register_session(session, actor, sender).await,
                Err(err) => {
                    warn!(error = %err, "REGISTER 帧携带无效身份，已丢弃");
                }
            },
            ControlFrame::MarkAsSeen { conversation_id } => {
                let Some(actor) = session.actor.as_ref() else {
                    warn!("未注册连接发来 MARK_AS_SEEN，已丢弃");
                    return;
                };

                // 计数清零写入共享存储；缓存故障不中断连接
                if let Err(err) = self
                    .unseen_counts
                    .clear(actor.role, &conversation_id)
                    .await
                {
                    warn!(
                        actor = %actor,
                        conversation_id = %conversation_id,
                        error = %err,
                        "未读计数清零失败，已忽略"
                    );
                } else {
                    debug!(actor = %actor, conversation_id = %conversation_id, "未读计数已清零");
                }
            }
        }
    }

    async fn register_session(
        &self,
        session: &mut ConnectionSession,
        actor: ActorId,
        sender: &ConnectionSender,
    ) {
        // 同一连接换绑身份时先解除旧绑定
        if let Some(previous) = session.actor.replace(actor.clone()) {
            if previous != actor {
                self.registry.unregister(&previous).await;
            }
        }
        self.registry.register(&actor, sender.clone()).await;
        info!(actor = %actor, "会话已注册");
    }

    async fn handle_chat(&self, frame: ChatSendFrame) {
        // 必填字段校验——失败只记日志静默丢弃，当前范围不向发送方回错
        if frame.to_user_id.is_empty()
            || frame.conversation_id.is_empty()
            || frame.message_body.is_empty()
        {
            warn!("聊天帧缺少必填字段，已丢弃");
            return;
        }

        let receiver = match ActorId::receiver_of(frame.sender_type, &frame.to_user_id) {
            Ok(actor) => actor,
            Err(err) => {
                warn!(error = %err, "无法构造接收方身份，已丢弃");
                return;
            }
        };
        let sender_key = match ActorId::new(frame.sender_type, &frame.from_user_id) {
            Ok(actor) => actor,
            Err(err) => {
                warn!(error = %err, "无法构造发送方身份，已丢弃");
                return;
            }
        };

        let payload = MessagePayload {
            conversation_id: frame.conversation_id.clone(),
            sender_id: frame.from_user_id.clone(),
            sender_type: frame.sender_type,
            content: frame.message_body.clone(),
            created_at: Utc::now(),
        };

        // 原子自增接收方未读计数并取回新值；失败时跳过计数推送，
        // 消息本身照常投递和入队
        let new_count = match self
            .unseen_counts
            .increment(receiver.role, &frame.conversation_id)
            .await
        {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(
                    receiver = %receiver,
                    conversation_id = %frame.conversation_id,
                    error = %err,
                    "未读计数自增失败，跳过计数推送"
                );
                None
            }
        };

        // 接收方在本实例在线则实时投递，不在线退化为仅入队
        if let Some(receiver_tx) = self.registry.lookup(&receiver).await {
            if receiver_tx
                .send(ServerEvent::NewMessage(payload.clone()))
                .is_ok()
            {
                if let Some(count) = new_count {
                    let _ = receiver_tx.send(ServerEvent::UnseenCountUpdate(UnseenCountPayload {
                        conversation_id: frame.conversation_id.clone(),
                        count,
                    }));
                }
                debug!(receiver = %receiver, "消息与未读计数已实时投递");
            }
        } else {
            debug!(receiver = %receiver, "接收方不在本实例，消息仅入队");
        }

        // 总是回显给发送方自己的活动连接，另一个打开的标签页同步显示
        if let Some(sender_tx) = self.registry.lookup(&sender_key).await {
            let _ = sender_tx.send(ServerEvent::NewMessage(payload.clone()));
        }

        // 入队失败只影响这一条消息的持久化路径，连接保持打开
        match self.queue.publish(&payload).await {
            Ok(()) => {
                debug!(conversation_id = %payload.conversation_id, "消息已入队");
            }
            Err(err) => {
                error!(
                    conversation_id = %payload.conversation_id,
                    error = %err,
                    "消息入队失败"
                );
            }
        }
    }
}
