//! Henyo 共享协议库
//!
//! 包含:
//! - 玩家、角色、对局快照等核心数据结构
//! - 消息类型定义 (ClientFrame, ClientMessage, ServerMessage)
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - 帧编解码 (FrameReader, FrameWriter)

mod constants;
mod error;
mod game;
mod message;
mod player;
mod transport;

pub use constants::*;
pub use error::{ProtocolError, Result};
pub use game::{
    GameSettings, GameSnapshot, GameStatus, GameType, Language, SessionId, SettingsUpdate,
};
pub use message::{Ack, AckData, ClientFrame, ClientMessage, ErrorCode, ServerMessage};
pub use player::{Player, PlayerId, Role};
pub use transport::{
    Connection, Connector, Listener,
    TcpConnection, TcpConnector, TcpListener,
    FrameReader, FrameWriter,
};
