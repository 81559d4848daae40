//! Core error types.

use thiserror::Error;

use tubevault_models::ChannelError;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File is not ready: {0}")]
    FileNotReady(String),

    #[error("File missing on disk: {0}")]
    FileMissing(String),

    #[error("Store error: {0}")]
    Store(#[from] tubevault_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] tubevault_queue::QueueError),

    #[error("Extraction error: {0}")]
    Extract(#[from] tubevault_extract::ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<ChannelError> for CoreError {
    fn from(e: ChannelError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}
