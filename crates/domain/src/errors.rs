//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 参与者身份格式错误
    #[error("无效的参与者身份: {value}")]
    InvalidActorId { value: String },

    /// 会话相关错误
    #[error("会话错误: {message}")]
    ConversationError { message: String },

    /// 消息相关错误
    #[error("消息错误: {message}")]
    MessageError { message: String },

    /// 验证错误
    #[error("验证失败: {field}: {message}")]
    ValidationError { field: String, message: String },
}

impl DomainError {
    /// 创建参与者身份错误
    pub fn invalid_actor_id(value: impl Into<String>) -> Self {
        Self::InvalidActorId {
            value: value.into(),
        }
    }

    /// 创建会话错误
    pub fn conversation_error(message: impl Into<String>) -> Self {
        Self::ConversationError {
            message: message.into(),
        }
    }

    /// 创建消息错误
    pub fn message_error(message: impl Into<String>) -> Self {
        Self::MessageError {
            message: message.into(),
        }
    }

    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// 领域层结果类型
pub type DomainResult<T> = Result<T, DomainError>;
