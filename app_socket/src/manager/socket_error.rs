use common::errors::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection not found")]
    ConnectionNotFound,
    #[error("encode failed: {0}")]
    EncodeFailed(#[from] serde_json::Error),
    #[error("channel closed")]
    ChannelClosed,
    /// 注册身份在租户内不存在或角色不符
    #[error("unknown participant {0}")]
    UnknownParticipant(String),
    #[error("participant lookup failed: {0}")]
    Lookup(#[from] AppError),
}
