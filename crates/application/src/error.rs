use domain::DomainError;
use thiserror::Error;

/// 应用层错误类型
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("queue error: {0}")]
    Queue(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    /// 创建缓存错误（在线标记、未读计数）
    pub fn cache(message: impl Into<String>) -> Self {
        ApplicationError::Cache(message.into())
    }

    /// 创建队列错误
    pub fn queue(message: impl Into<String>) -> Self {
        ApplicationError::Queue(message.into())
    }

    /// 创建存储错误
    pub fn storage(message: impl Into<String>) -> Self {
        ApplicationError::Storage(message.into())
    }

    /// 创建基础设施错误
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }
}
