//! 会话组与参与者实体定义
//!
//! 当前范围内会话都是买家与卖家之间的 1:1 会话（`is_group` 恒为
//! false），每个会话持有恰好两行参与者记录。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

/// 会话组实体
///
/// 不变量：同一无序 {user, seller} 对至多存在一个非群组会话，
/// 由创建前的成员查找保证。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationGroup {
    pub id: String,
    pub is_group: bool,
    pub creator_id: String,
    pub participant_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationGroup {
    /// 创建买家与卖家之间的新 1:1 会话
    pub fn new_direct(user_id: impl Into<String>, seller_id: impl Into<String>) -> DomainResult<Self> {
        let user_id = user_id.into();
        let seller_id = seller_id.into();

        if user_id.is_empty() {
            return Err(DomainError::validation_error("user_id", "用户 ID 不能为空"));
        }
        if seller_id.is_empty() {
            return Err(DomainError::validation_error("seller_id", "卖家 ID 不能为空"));
        }
        if user_id == seller_id {
            return Err(DomainError::conversation_error("会话双方不能是同一身份"));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            is_group: false,
            creator_id: user_id.clone(),
            participant_ids: vec![user_id, seller_id],
            created_at: now,
            updated_at: now,
        })
    }

    /// 从持久化字段重建实体
    #[allow(clippy::too_many_arguments)]
    pub fn with_fields(
        id: String,
        is_group: bool,
        creator_id: String,
        participant_ids: Vec<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            is_group,
            creator_id,
            participant_ids,
            created_at,
            updated_at,
        }
    }

    /// 判断某身份是否属于该会话
    pub fn has_participant(&self, participant_id: &str) -> bool {
        self.participant_ids.iter().any(|p| p == participant_id)
    }

    /// 无序匹配 {user, seller} 对
    pub fn matches_pair(&self, user_id: &str, seller_id: &str) -> bool {
        !self.is_group && self.has_participant(user_id) && self.has_participant(seller_id)
    }

    /// 会话中给定身份的对端
    pub fn peer_of(&self, participant_id: &str) -> Option<&str> {
        self.participant_ids
            .iter()
            .find(|p| p.as_str() != participant_id)
            .map(|p| p.as_str())
    }
}

/// 会话参与者
///
/// 不变量：`user_id` 与 `seller_id` 必须恰好设置一个。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub conversation_id: String,
    pub user_id: Option<String>,
    pub seller_id: Option<String>,
}

impl Participant {
    /// 买家侧参与者行
    pub fn user(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: Some(user_id.into()),
            seller_id: None,
        }
    }

    /// 卖家侧参与者行
    pub fn seller(conversation_id: impl Into<String>, seller_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: None,
            seller_id: Some(seller_id.into()),
        }
    }

    /// 校验单边身份不变量
    pub fn validate(&self) -> DomainResult<()> {
        match (&self.user_id, &self.seller_id) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(DomainError::validation_error(
                "participant",
                "user_id 和 seller_id 必须恰好设置一个",
            )),
        }
    }
}
