//! Extraction error types.

use thiserror::Error;

pub type ExtractResult<T> = Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("yt-dlp binary not found in PATH")]
    YtDlpNotFound,

    #[error("Extraction failed: {0}")]
    ExtractFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("download finished but output file not found")]
    OutputMissing,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub fn extract_failed(msg: impl Into<String>) -> Self {
        Self::ExtractFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }
}
