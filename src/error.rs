use std::time::Duration;

use thiserror::Error;

// Basic error handling with thiserror
#[derive(Error, Debug)]
pub enum TonearmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("frame exceeds maximum size ({size} > {max} bytes)")]
    FrameTooLarge { size: usize, max: usize },

    #[error("invalid frame header: {0}")]
    InvalidFrameHeader(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("reconnect budget exhausted after {0} attempts")]
    RetriesExhausted(u32),

    #[error("report upload failed: {0}")]
    UploadFailed(#[from] reqwest::Error),

    #[error("report upload rejected with HTTP {0}")]
    UploadRejected(u16),

    #[error("task panicked or cancelled")]
    TaskJoinError(#[from] tokio::task::JoinError),
}
