//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 玩家名称最大长度
pub const MAX_PLAYER_NAME_LEN: usize = 20;

/// 每个会话的玩家数（线索方 + 猜词方）
pub const PLAYERS_PER_SESSION: usize = 2;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 服务端最大连接数
pub const MAX_CONNECTIONS: usize = 200;

/// 服务端心跳超时（秒）- 超过此时间无消息则断开
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 断线宽限期（秒）- 超过此时间未重连则视为离开
pub const DISCONNECT_GRACE_PERIOD_SECS: u64 = 10;

/// 倒计时间隔（毫秒）
pub const TICK_INTERVAL_MS: u64 = 1000;

/// 默认回合时长（秒）
pub const DEFAULT_ROUND_DURATION_SECS: u32 = 60;

/// 默认跳过次数
pub const DEFAULT_PASSES: u32 = 3;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
