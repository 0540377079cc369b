//! 错误类型定义

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 玩家名称为空
    #[error("Player name is empty")]
    PlayerNameEmpty,

    /// 玩家名称过长
    #[error("Player name too long: {len} chars (max: {max})")]
    PlayerNameTooLong { len: usize, max: usize },
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
