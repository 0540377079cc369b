//! Pinoy Henyo 服务端
//!
//! 包含:
//! - 会话注册与成员管理
//! - 回合状态与倒计时
//! - 断线宽限期
//! - 谜底词库

pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod network;
pub mod registry;
pub mod server;
pub mod timer;
pub mod words;

pub use config::ServerConfig;
pub use connection::{ConnectionId, ConnectionSession, Connections};
pub use error::{Result, ServerError};
pub use game::{Game, Tick};
pub use network::GameServer;
pub use registry::SessionRegistry;
pub use server::{MessageHandler, ServerEvent, ServerState};
pub use timer::Scheduler;
pub use words::{Category, GuessWord, WordBank, WordProvider};
