//! Error types for the feed core

use thiserror::Error;

/// Feed core errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to parse message: {0}")]
    Parse(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
