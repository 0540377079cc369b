//! 消息类型定义

use serde::{Deserialize, Serialize};

use crate::game::{GameSnapshot, GameType, SessionId, SettingsUpdate};
use crate::player::{Player, PlayerId};

/// 客户端发出的一帧：请求 + 可选的确认编号
///
/// 带 `ack` 的请求会收到一条 [`ServerMessage::Ack`]。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    pub request: ClientMessage,
}

impl ClientFrame {
    /// 需要确认的请求
    pub fn with_ack(ack: u64, request: ClientMessage) -> Self {
        Self {
            ack: Some(ack),
            request,
        }
    }

    /// 不需要确认的请求
    pub fn fire(request: ClientMessage) -> Self {
        Self { ack: None, request }
    }
}

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    // === 成员 ===
    /// 加入会话（不存在则创建）
    #[serde(rename = "request:joinGame")]
    JoinGame {
        session_id: SessionId,
        game_type: GameType,
        player_name: String,
    },
    /// 断线后重新加入
    #[serde(rename = "request:rejoinGame")]
    RejoinGame { session_id: SessionId, player: Player },
    /// 进入页面时查询会话状态
    #[serde(rename = "request:enterGame")]
    EnterGame { session_id: SessionId },
    /// 主动离开
    #[serde(rename = "request:leaveGame")]
    LeaveGame {
        session_id: SessionId,
        player_id: PlayerId,
    },

    // === 回合 ===
    /// 开始回合
    #[serde(rename = "request:startGame")]
    StartGame {
        session_id: SessionId,
        #[serde(default)]
        settings: SettingsUpdate,
    },
    /// 猜中
    #[serde(rename = "request:wordGuessSuccessful")]
    WordGuessSuccessful { session_id: SessionId },
    /// 跳过当前谜底
    #[serde(rename = "request:changeGuessWord")]
    ChangeGuessWord { session_id: SessionId },
    /// 交换角色
    #[serde(rename = "request:switchRole")]
    SwitchRole { session_id: SessionId },
    /// 暂停
    #[serde(rename = "request:pauseGame")]
    PauseGame { session_id: SessionId },
    /// 继续
    #[serde(rename = "request:resumeGame")]
    ResumeGame { session_id: SessionId },
    /// 回到大厅
    #[serde(rename = "request:backToLobby")]
    BackToLobby { session_id: SessionId },

    // === 心跳 ===
    #[serde(rename = "ping")]
    Ping,
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// 对带 `ack` 的请求的确认（只发给请求方）
    #[serde(rename = "ack")]
    Ack { ack: u64, response: Ack },

    // === 广播 ===
    #[serde(rename = "notify:playersUpdated")]
    PlayersUpdated(GameSnapshot),
    #[serde(rename = "notify:gameStarted")]
    GameStarted(GameSnapshot),
    /// 倒计时（只带剩余秒数）
    #[serde(rename = "notify:remainingTimeUpdated")]
    RemainingTimeUpdated(u32),
    #[serde(rename = "notify:wordGuessFailed")]
    WordGuessFailed {
        passed_words: Vec<String>,
        game: GameSnapshot,
    },
    #[serde(rename = "notify:wordGuessSuccessful")]
    WordGuessSuccessful {
        passed_words: Vec<String>,
        game: GameSnapshot,
    },
    #[serde(rename = "notify:roleSwitched")]
    RoleSwitched(GameSnapshot),
    #[serde(rename = "notify:backToLobby")]
    BackToLobby(GameSnapshot),
    #[serde(rename = "notify:guessWordChanged")]
    GuessWordChanged(GameSnapshot),
    #[serde(rename = "notify:gamePaused")]
    GamePaused(GameSnapshot),
    #[serde(rename = "notify:gameResumed")]
    GameResumed(GameSnapshot),

    // === 心跳 ===
    #[serde(rename = "pong")]
    Pong,

    // === 错误 ===
    /// 无法归属到某个请求的错误（如帧解析失败）
    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

/// 请求确认：`{success: true, data}` 或 `{success: false, error}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawAck", try_from = "RawAck")]
pub enum Ack {
    Success(AckData),
    Failure(String),
}

impl Ack {
    pub fn is_success(&self) -> bool {
        matches!(self, Ack::Success(_))
    }
}

impl<E: std::fmt::Display> From<std::result::Result<AckData, E>> for Ack {
    fn from(result: std::result::Result<AckData, E>) -> Self {
        match result {
            Ok(data) => Ack::Success(data),
            Err(e) => Ack::Failure(e.to_string()),
        }
    }
}

/// 确认中携带的数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AckData {
    /// 加入 / 重新加入：自己的玩家信息与当前快照
    Player { player: Player, game: GameSnapshot },
    /// 进入页面：会话不存在时为 null
    Game { game: Option<GameSnapshot> },
    /// 无数据
    Empty,
}

/// Ack 的线上格式
#[derive(Serialize, Deserialize)]
struct RawAck {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<AckData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Ack> for RawAck {
    fn from(ack: Ack) -> Self {
        match ack {
            Ack::Success(data) => RawAck {
                success: true,
                data: Some(data),
                error: None,
            },
            Ack::Failure(error) => RawAck {
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<RawAck> for Ack {
    type Error = String;

    fn try_from(raw: RawAck) -> std::result::Result<Self, Self::Error> {
        if raw.success {
            Ok(Ack::Success(raw.data.unwrap_or(AckData::Empty)))
        } else {
            raw.error
                .map(Ack::Failure)
                .ok_or_else(|| "failed ack without error message".to_string())
        }
    }
}

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// 无法解析的消息
    InvalidMessage = 100,
    /// 服务器连接数已满
    ServerFull = 500,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Role;

    #[test]
    fn test_client_message_from_wire() {
        let json = r#"{
            "ack": 7,
            "request": {
                "event": "request:joinGame",
                "data": { "sessionId": "ABCD", "gameType": "DUO", "playerName": "Ana" }
            }
        }"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();

        assert_eq!(frame.ack, Some(7));
        match frame.request {
            ClientMessage::JoinGame {
                session_id,
                game_type,
                player_name,
            } => {
                assert_eq!(session_id, "ABCD");
                assert_eq!(game_type, GameType::Duo);
                assert_eq!(player_name, "Ana");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_start_game_without_settings() {
        let json = r#"{"request":{"event":"request:startGame","data":{"sessionId":"ABCD"}}}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();

        assert_eq!(frame.ack, None);
        match frame.request {
            ClientMessage::StartGame { settings, .. } => {
                assert_eq!(settings, SettingsUpdate::default())
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_ping_without_data() {
        let frame: ClientFrame = serde_json::from_str(r#"{"request":{"event":"ping"}}"#).unwrap();
        assert!(matches!(frame.request, ClientMessage::Ping));
        assert_eq!(frame.ack, None);
    }

    #[test]
    fn test_ack_success_shape() {
        let player = Player::new("Ana", Role::Guesser);
        let msg = ServerMessage::Ack {
            ack: 3,
            response: Ack::Success(AckData::Game { game: None }),
        };
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["event"], "ack");
        assert_eq!(value["data"]["ack"], 3);
        assert_eq!(value["data"]["response"]["success"], true);
        assert!(value["data"]["response"]["data"]["game"].is_null());
        assert!(value["data"]["response"].get("error").is_none());

        let empty = serde_json::to_value(Ack::Success(AckData::Empty)).unwrap();
        assert_eq!(empty["success"], true);
        assert!(empty["data"].is_null());

        // 玩家 ID 以字符串形式传输
        let player_json = serde_json::to_value(&player).unwrap();
        assert_eq!(player_json["id"], player.id.to_string());
        assert_eq!(player_json["role"], "GUESSER");
    }

    #[test]
    fn test_ack_failure_shape() {
        let value = serde_json::to_value(Ack::Failure("Game (ID: X) not found".into())).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Game (ID: X) not found");
        assert!(value.get("data").is_none());

        let decoded: Ack = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, Ack::Failure("Game (ID: X) not found".into()));
    }

    #[test]
    fn test_ack_from_result() {
        let ok: std::result::Result<AckData, String> = Ok(AckData::Empty);
        assert!(Ack::from(ok).is_success());

        let err: std::result::Result<AckData, String> = Err("boom".into());
        assert_eq!(Ack::from(err), Ack::Failure("boom".into()));
    }

    #[test]
    fn test_tick_message_shape() {
        let value = serde_json::to_value(ServerMessage::RemainingTimeUpdated(42)).unwrap();
        assert_eq!(value["event"], "notify:remainingTimeUpdated");
        assert_eq!(value["data"], 42);
    }
}
