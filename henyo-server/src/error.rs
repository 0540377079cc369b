//! 服务端错误类型

use thiserror::Error;

use protocol::{GameType, PlayerId, ProtocolError, SessionId};

/// 请求处理错误（只返回给请求方）
#[derive(Error, Debug)]
pub enum ServerError {
    /// 会话不存在
    #[error("Game (ID: {0}) not found")]
    GameNotFound(SessionId),

    /// 玩家不在会话中
    #[error("Player (ID: {player_id}) not found in game (ID: {session_id})")]
    PlayerNotFound {
        session_id: SessionId,
        player_id: PlayerId,
    },

    /// 请求参数与连接绑定的身份不一致
    #[error("Connection is not bound to player (ID: {player_id}) in game (ID: {session_id})")]
    IdentityMismatch {
        session_id: SessionId,
        player_id: PlayerId,
    },

    /// 会话已满
    #[error("Game (ID: {0}) is full")]
    SessionFull(SessionId),

    /// 不支持的游戏类型
    #[error("Unsupported game type: {0:?}")]
    UnsupportedGameType(GameType),

    /// 玩家名称不合法
    #[error("Invalid player name: {0}")]
    InvalidPlayerName(#[from] ProtocolError),

    /// 设置房主时玩家不在会话中
    #[error("Player (ID: {player_id}) cannot be host of game (ID: {session_id})")]
    HostNotInGame {
        session_id: SessionId,
        player_id: PlayerId,
    },
}

/// 服务端操作结果类型
pub type Result<T> = std::result::Result<T, ServerError>;
