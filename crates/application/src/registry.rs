//! 连接注册表
//!
//! 进程内的身份到活动连接映射，同时把带 TTL 的在线标记写入共享
//! 缓存。注册表是进程本地的：水平扩展部署下，接收方连接在其他
//! 实例时无法本地实时投递，这类消息退化为仅入队，由摄取消费者
//! 落库——这是已接受的限制，不是缺陷。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use domain::{ActorId, ServerEvent};

use crate::ports::PresenceStore;

/// 单个连接的出站事件发送端
pub type ConnectionSender = mpsc::UnboundedSender<ServerEvent>;

/// 进程内连接注册表
pub struct ConnectionRegistry {
    /// 身份串（`user_<id>` / `seller_<id>`）到连接发送端的映射
    connections: RwLock<HashMap<String, ConnectionSender>>,
    presence: Arc<dyn PresenceStore>,
}

impl ConnectionRegistry {
    pub fn new(presence: Arc<dyn PresenceStore>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            presence,
        }
    }

    /// 绑定身份到活动连接，后连接覆盖先连接（不做多端扇出）。
    ///
    /// 在线标记写入是尽力而为的：缓存故障只记日志，注册本身照常
    /// 成功，不能阻塞消息投递。
    pub async fn register(&self, actor: &ActorId, sender: ConnectionSender) {
        let key = actor.to_string();
        let replaced = {
            let mut connections = self.connections.write().await;
            connections.insert(key.clone(), sender).is_some()
        };

        if replaced {
            debug!(actor = %key, "覆盖既有连接绑定");
        }
        info!(actor = %key, "连接已注册");

        if let Err(err) = self.presence.mark_online(actor).await {
            warn!(actor = %key, error = %err, "写入在线标记失败，已忽略");
        }
    }

    /// 连接关闭时解除绑定并清除在线标记
    pub async fn unregister(&self, actor: &ActorId) {
        let key = actor.to_string();
        {
            let mut connections = self.connections.write().await;
            connections.remove(&key);
        }
        info!(actor = %key, "连接已注销");

        if let Err(err) = self.presence.mark_offline(actor).await {
            warn!(actor = %key, error = %err, "清除在线标记失败，已忽略");
        }
    }

    /// 查找活动连接，路由器投递前调用
    pub async fn lookup(&self, actor: &ActorId) -> Option<ConnectionSender> {
        let connections = self.connections.read().await;
        connections.get(&actor.to_string()).cloned()
    }

    /// 当前注册的连接数（用于监控）
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
