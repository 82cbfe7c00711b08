//! 会话参与者身份定义
//!
//! 买家（user）和卖家（seller）共用一套带角色前缀的身份格式
//! `user_<id>` / `seller_<id>`，用于寻址连接、在线标记和未读计数。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

/// 参与者角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    User,
    Seller,
}

impl ActorRole {
    /// 角色的字符串形式，与线上协议和缓存键保持一致
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::User => "user",
            ActorRole::Seller => "seller",
        }
    }

    /// 对端角色：一条 1:1 会话中消息的接收方角色
    pub fn opposite(&self) -> ActorRole {
        match self {
            ActorRole::User => ActorRole::Seller,
            ActorRole::Seller => ActorRole::User,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 带角色前缀的参与者身份
///
/// 连接注册、在线标记和消息路由都以它为键。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId {
    pub role: ActorRole,
    pub id: String,
}

impl ActorId {
    /// 由角色和裸 ID 组合身份
    pub fn new(role: ActorRole, id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::invalid_actor_id("<empty id>"));
        }
        Ok(Self { role, id })
    }

    /// 消息接收方的身份：角色取反，ID 来自 `toUserId`
    pub fn receiver_of(sender_role: ActorRole, to_id: impl Into<String>) -> DomainResult<Self> {
        Self::new(sender_role.opposite(), to_id)
    }
}

impl FromStr for ActorId {
    type Err = DomainError;

    /// 解析 `user_<id>` / `seller_<id>` 格式的身份串
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (role, id) = if let Some(rest) = value.strip_prefix("user_") {
            (ActorRole::User, rest)
        } else if let Some(rest) = value.strip_prefix("seller_") {
            (ActorRole::Seller, rest)
        } else {
            return Err(DomainError::invalid_actor_id(value));
        };

        if id.is_empty() {
            return Err(DomainError::invalid_actor_id(value));
        }

        Ok(Self {
            role,
            id: id.to_string(),
        })
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.role, self.id)
    }
}
