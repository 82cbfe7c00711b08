//! 应用层端口定义
//!
//! 路由器与摄取消费者依赖的外部能力抽象，由基础设施层提供
//! Redis / Kafka / PostgreSQL 实现，测试中用内存实现替换。

use async_trait::async_trait;

use domain::{ActorId, ActorRole, ChatMessage, ConversationGroup, MessagePayload};

use crate::error::ApplicationError;

/// 在线标记存储
///
/// 写入失败不阻塞消息流，调用方记录日志后吞掉错误。
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// 设置带 TTL 的在线标记，仅在连接注册时调用
    async fn mark_online(&self, actor: &ActorId) -> Result<(), ApplicationError>;

    /// 连接关闭时清除在线标记
    async fn mark_offline(&self, actor: &ActorId) -> Result<(), ApplicationError>;

    /// 会话列表渲染时读取在线状态
    async fn is_online(&self, actor: &ActorId) -> Result<bool, ApplicationError>;
}

/// 未读计数存储
///
/// 按（接收方角色，会话）维度计数，多连接并发自增必须由
/// 存储层的原子自增原语保证，不引入应用层锁。
#[async_trait]
pub trait UnseenCountStore: Send + Sync {
    /// 原子自增并返回新值，供路由器立即回推客户端
    async fn increment(
        &self,
        role: ActorRole,
        conversation_id: &str,
    ) -> Result<i64, ApplicationError>;

    /// MARK_AS_SEEN 时清零，幂等
    async fn clear(&self, role: ActorRole, conversation_id: &str) -> Result<(), ApplicationError>;

    /// 会话列表渲染时读取，键不存在读作 0
    async fn read(&self, role: ActorRole, conversation_id: &str) -> Result<i64, ApplicationError>;
}

/// 持久化队列
///
/// 记录以会话 ID 为分区键，保证同一会话的消息在队列层有序。
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, payload: &MessagePayload) -> Result<(), ApplicationError>;
}

/// 消息持久化存储
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 单事务批量插入，整批要么全部落库要么全部失败
    async fn insert_batch(&self, messages: &[ChatMessage]) -> Result<(), ApplicationError>;

    /// 按会话倒序分页读取历史
    async fn list_page(
        &self,
        conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ChatMessage>, ApplicationError>;
}

/// 会话/参与者数据访问
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// 单事务创建会话组和两行参与者记录
    async fn create_with_participants(
        &self,
        group: &ConversationGroup,
    ) -> Result<(), ApplicationError>;

    /// 按无序 {user, seller} 对查找既有会话
    async fn find_by_pair(
        &self,
        user_id: &str,
        seller_id: &str,
    ) -> Result<Option<ConversationGroup>, ApplicationError>;

    /// 按 ID 读取会话
    async fn get(&self, conversation_id: &str)
        -> Result<Option<ConversationGroup>, ApplicationError>;

    /// 某参与者的全部会话，最近更新在前
    async fn list_for_participant(
        &self,
        participant_id: &str,
    ) -> Result<Vec<ConversationGroup>, ApplicationError>;
}
