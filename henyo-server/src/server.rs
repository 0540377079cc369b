//! 服务器主逻辑
//!
//! 所有状态修改（请求、倒计时、断线宽限期到期）都作为 [`ServerEvent`]
//! 在同一个事件循环中依次处理。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use protocol::{
    AckData, ClientFrame, ClientMessage, ErrorCode, GameType, Player, PlayerId, ServerMessage,
    SessionId, SettingsUpdate, PLAYERS_PER_SESSION,
};

use crate::connection::{ConnectionId, ConnectionSession, Connections};
use crate::error::{Result, ServerError};
use crate::game::{Game, Tick};
use crate::registry::SessionRegistry;
use crate::timer::{DeferredLeave, Scheduler};
use crate::words::WordProvider;

/// 事件循环的输入
#[derive(Debug)]
pub enum ServerEvent {
    /// 新连接
    Connected {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// 客户端请求
    Request {
        connection_id: ConnectionId,
        frame: ClientFrame,
    },
    /// 无法解析的消息
    Malformed {
        connection_id: ConnectionId,
        reason: String,
    },
    /// 连接断开
    Disconnected { connection_id: ConnectionId },
    /// 回合倒计时
    Tick { session_id: SessionId, epoch: u64 },
    /// 断线宽限期结束
    GraceExpired {
        session_id: SessionId,
        player_id: PlayerId,
        ticket: u64,
    },
}

/// 等待宽限期结束的断线玩家
struct PendingLeave {
    departed: ConnectionSession,
    timer: DeferredLeave,
}

/// 服务器状态
pub struct ServerState {
    pub games: SessionRegistry,
    pub connections: Connections,
    words: Arc<dyn WordProvider>,
    scheduler: Scheduler,
    /// (会话, 玩家) -> 延迟离开
    pending_leaves: HashMap<(SessionId, PlayerId), PendingLeave>,
    next_ticket: u64,
}

impl ServerState {
    pub fn new(words: Arc<dyn WordProvider>, scheduler: Scheduler) -> Self {
        Self {
            games: SessionRegistry::new(),
            connections: Connections::new(),
            words,
            scheduler,
            pending_leaves: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// 是否有等待中的延迟离开
    pub fn has_pending_leave(&self, session_id: &str, player_id: PlayerId) -> bool {
        self.pending_leaves
            .contains_key(&(session_id.to_string(), player_id))
    }

    /// 为断开的绑定安排延迟离开
    ///
    /// 同一玩家已有等待中的延迟离开时取消旧的，以最近一次断线重新计时。
    fn schedule_leave(&mut self, departed: ConnectionSession) {
        let Some((session_id, player_id)) = departed.binding().map(|(s, p)| (s.clone(), p)) else {
            return;
        };

        self.next_ticket += 1;
        let timer = self
            .scheduler
            .deferred_leave(session_id.clone(), player_id, self.next_ticket);

        info!(
            "玩家 {} 断开会话 {}，{} 秒后确认",
            player_id,
            session_id,
            self.scheduler.grace_period().as_secs()
        );
        let replaced = self
            .pending_leaves
            .insert((session_id, player_id), PendingLeave { departed, timer });
        if replaced.is_some() {
            debug!("玩家 {} 重新开始宽限期", player_id);
        }
    }

    /// 取消延迟离开
    fn cancel_pending_leave(&mut self, session_id: &str, player_id: PlayerId) {
        if self
            .pending_leaves
            .remove(&(session_id.to_string(), player_id))
            .is_some()
        {
            debug!("取消玩家 {} 的延迟离开", player_id);
        }
    }

    /// 绑定连接；原先绑定的玩家走断线宽限期
    fn rebind(&mut self, connection_id: ConnectionId, session_id: &str, player_id: PlayerId) {
        if let Some((old_session, old_player)) =
            self.connections.bind(connection_id, session_id, player_id)
        {
            self.schedule_leave(ConnectionSession::with_binding(
                connection_id,
                old_session,
                old_player,
            ));
        }
    }
}

/// 待发送的消息
///
/// 先发给单个连接（确认），再广播，最后断开连接。
struct PendingMessages {
    messages: Vec<(ConnectionId, ServerMessage)>,
    broadcasts: Vec<(SessionId, ServerMessage)>,
    closes: Vec<ConnectionId>,
}

impl PendingMessages {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            broadcasts: Vec::new(),
            closes: Vec::new(),
        }
    }

    fn send(&mut self, connection_id: ConnectionId, msg: ServerMessage) {
        self.messages.push((connection_id, msg));
    }

    fn broadcast(&mut self, session_id: &str, msg: ServerMessage) {
        self.broadcasts.push((session_id.to_string(), msg));
    }

    fn close(&mut self, connection_id: ConnectionId) {
        self.closes.push(connection_id);
    }

    fn flush(self, state: &mut ServerState) {
        for (connection_id, msg) in self.messages {
            state.connections.send(connection_id, msg);
        }
        for (session_id, msg) in self.broadcasts {
            state.connections.broadcast(&session_id, msg);
        }
        for connection_id in self.closes {
            state.connections.close(connection_id);
        }
    }
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理一个事件
    pub async fn handle_event(state: &mut ServerState, event: ServerEvent) {
        let mut pending = PendingMessages::new();

        match event {
            ServerEvent::Connected {
                connection_id,
                sender,
            } => {
                debug!("连接 {} 已建立", connection_id);
                state.connections.insert(connection_id, sender);
            }
            ServerEvent::Request {
                connection_id,
                frame,
            } => {
                Self::handle_frame(state, &mut pending, connection_id, frame).await;
            }
            ServerEvent::Malformed {
                connection_id,
                reason,
            } => {
                warn!("连接 {} 消息无法解析: {}", connection_id, reason);
                pending.send(
                    connection_id,
                    ServerMessage::Error {
                        code: ErrorCode::InvalidMessage,
                        message: reason,
                    },
                );
            }
            ServerEvent::Disconnected { connection_id } => {
                Self::handle_disconnect(state, connection_id);
            }
            ServerEvent::Tick { session_id, epoch } => {
                Self::handle_tick(state, &mut pending, &session_id, epoch);
            }
            ServerEvent::GraceExpired {
                session_id,
                player_id,
                ticket,
            } => {
                Self::handle_grace_expired(state, &mut pending, session_id, player_id, ticket);
            }
        }

        // 发送待发送的消息
        pending.flush(state);
    }

    /// 处理一帧请求，按需回复确认
    async fn handle_frame(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        connection_id: ConnectionId,
        frame: ClientFrame,
    ) {
        if state.connections.session(connection_id).is_none() {
            debug!("连接 {} 已关闭，忽略请求", connection_id);
            return;
        }

        let ClientFrame { ack, request } = frame;
        let result = Self::handle(state, pending, connection_id, request).await;

        if let Err(e) = &result {
            warn!("连接 {} 请求失败: {}", connection_id, e);
        }
        if let Some(ack) = ack {
            pending.send(
                connection_id,
                ServerMessage::Ack {
                    ack,
                    response: result.into(),
                },
            );
        }
    }

    /// 处理客户端消息
    async fn handle(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        connection_id: ConnectionId,
        msg: ClientMessage,
    ) -> Result<AckData> {
        match msg {
            // === 成员 ===
            ClientMessage::JoinGame {
                session_id,
                game_type,
                player_name,
            } => Self::handle_join(
                state,
                pending,
                connection_id,
                session_id,
                game_type,
                player_name,
            ),
            ClientMessage::RejoinGame { session_id, player } => {
                Self::handle_rejoin(state, pending, connection_id, session_id, player)
            }
            ClientMessage::EnterGame { session_id } => Ok(Self::handle_enter(state, &session_id)),
            ClientMessage::LeaveGame {
                session_id,
                player_id,
            } => Self::handle_leave(state, pending, connection_id, session_id, player_id),

            // === 回合 ===
            ClientMessage::StartGame {
                session_id,
                settings,
            } => Self::handle_start(state, pending, &session_id, settings).await,
            ClientMessage::WordGuessSuccessful { session_id } => {
                let game = Self::game_mut(state, &session_id)?;
                let snapshot = game.win();
                pending.broadcast(
                    &session_id,
                    ServerMessage::WordGuessSuccessful {
                        passed_words: snapshot.passed_words.clone(),
                        game: snapshot,
                    },
                );
                Ok(AckData::Empty)
            }
            ClientMessage::ChangeGuessWord { session_id } => {
                let game = state
                    .games
                    .get_mut(&session_id)
                    .ok_or_else(|| ServerError::GameNotFound(session_id.clone()))?;
                let snapshot = game.change_guess_word(state.words.as_ref()).await;
                pending.broadcast(&session_id, ServerMessage::GuessWordChanged(snapshot));
                Ok(AckData::Empty)
            }
            ClientMessage::SwitchRole { session_id } => {
                let snapshot = Self::game_mut(state, &session_id)?.switch_roles();
                pending.broadcast(&session_id, ServerMessage::RoleSwitched(snapshot));
                Ok(AckData::Empty)
            }
            ClientMessage::PauseGame { session_id } => {
                let snapshot = Self::game_mut(state, &session_id)?.pause();
                pending.broadcast(&session_id, ServerMessage::GamePaused(snapshot));
                Ok(AckData::Empty)
            }
            ClientMessage::ResumeGame { session_id } => {
                let game = state
                    .games
                    .get_mut(&session_id)
                    .ok_or_else(|| ServerError::GameNotFound(session_id.clone()))?;
                let snapshot = game.resume(&state.scheduler);
                pending.broadcast(&session_id, ServerMessage::GameResumed(snapshot));
                Ok(AckData::Empty)
            }
            ClientMessage::BackToLobby { session_id } => {
                let snapshot = Self::game_mut(state, &session_id)?.reset();
                pending.broadcast(&session_id, ServerMessage::BackToLobby(snapshot));
                Ok(AckData::Empty)
            }

            // === 心跳 ===
            ClientMessage::Ping => {
                pending.send(connection_id, ServerMessage::Pong);
                Ok(AckData::Empty)
            }
        }
    }

    fn game_mut<'a>(state: &'a mut ServerState, session_id: &str) -> Result<&'a mut Game> {
        state
            .games
            .get_mut(session_id)
            .ok_or_else(|| ServerError::GameNotFound(session_id.to_string()))
    }

    /// 处理加入
    fn handle_join(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        connection_id: ConnectionId,
        session_id: SessionId,
        game_type: GameType,
        player_name: String,
    ) -> Result<AckData> {
        if game_type != GameType::Duo {
            return Err(ServerError::UnsupportedGameType(game_type));
        }
        Player::validate_name(&player_name)?;

        // 检查会话是否已满
        if let Some(game) = state.games.get(&session_id) {
            if game.player_count() >= PLAYERS_PER_SESSION {
                return Err(ServerError::SessionFull(session_id));
            }
        }

        let game = state.games.create(&session_id, game_type);
        let player = Player::new(player_name.trim(), game.next_role());
        game.add_player(player.clone());
        let snapshot = game.snapshot();

        state.rebind(connection_id, &session_id, player.id);
        info!(
            "玩家 {} ({}) 加入会话 {}，角色 {:?}",
            player.name, player.id, session_id, player.role
        );

        pending.broadcast(&session_id, ServerMessage::PlayersUpdated(snapshot.clone()));
        Ok(AckData::Player {
            player,
            game: snapshot,
        })
    }

    /// 处理重新加入
    ///
    /// 以服务端保存的玩家记录为准，只接受客户端带来的合法名称。
    fn handle_rejoin(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        connection_id: ConnectionId,
        session_id: SessionId,
        player: Player,
    ) -> Result<AckData> {
        let game = Self::game_mut(state, &session_id)?;
        let Some(stored) = game.player(player.id) else {
            return Err(ServerError::PlayerNotFound {
                session_id,
                player_id: player.id,
            });
        };

        let mut rejoining = stored.clone();
        if Player::validate_name(&player.name).is_ok() {
            rejoining.name = player.name.trim().to_string();
        }
        game.add_player(rejoining.clone());
        let snapshot = game.snapshot();

        state.cancel_pending_leave(&session_id, rejoining.id);
        state.rebind(connection_id, &session_id, rejoining.id);
        info!("玩家 {} 重新加入会话 {}", rejoining.id, session_id);

        pending.broadcast(&session_id, ServerMessage::PlayersUpdated(snapshot.clone()));
        Ok(AckData::Player {
            player: rejoining,
            game: snapshot,
        })
    }

    /// 处理进入页面时的查询
    fn handle_enter(state: &ServerState, session_id: &str) -> AckData {
        AckData::Game {
            game: state.games.get(session_id).map(Game::snapshot),
        }
    }

    /// 处理主动离开
    fn handle_leave(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        connection_id: ConnectionId,
        session_id: SessionId,
        player_id: PlayerId,
    ) -> Result<AckData> {
        if state.games.get(&session_id).is_none() {
            return Err(ServerError::GameNotFound(session_id));
        }

        // 只能以自己绑定的身份离开
        let is_bound = state
            .connections
            .session(connection_id)
            .is_some_and(|s| s.is_bound_to(&session_id, player_id));
        if !is_bound {
            return Err(ServerError::IdentityMismatch {
                session_id,
                player_id,
            });
        }

        state.cancel_pending_leave(&session_id, player_id);
        state.connections.clear(connection_id);
        pending.close(connection_id);

        info!("玩家 {} 离开会话 {}", player_id, session_id);
        Self::remove_player(state, pending, &session_id, player_id);
        Ok(AckData::Empty)
    }

    /// 移除玩家：空会话销毁，房主离开时交给最早加入的玩家
    ///
    /// 玩家或会话已不存在时什么也不做。
    fn remove_player(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        session_id: &str,
        player_id: PlayerId,
    ) {
        let Some(game) = state.games.get_mut(session_id) else {
            debug!("会话 {} 已不存在", session_id);
            return;
        };
        if game.remove_player(player_id).is_none() {
            debug!("玩家 {} 已不在会话 {} 中", player_id, session_id);
            return;
        }

        if game.is_empty() {
            state.games.remove(session_id);
            return;
        }

        if game.host_id() == Some(player_id) {
            if let Some(next_host) = game.first_player().map(|p| p.id) {
                if let Err(e) = game.set_host(next_host) {
                    warn!("房主交接失败: {}", e);
                } else {
                    info!("会话 {} 房主交给 {}", session_id, next_host);
                }
            }
        }

        pending.broadcast(session_id, ServerMessage::PlayersUpdated(game.snapshot()));
    }

    /// 处理开始回合
    async fn handle_start(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        session_id: &str,
        settings: SettingsUpdate,
    ) -> Result<AckData> {
        let game = state
            .games
            .get_mut(session_id)
            .ok_or_else(|| ServerError::GameNotFound(session_id.to_string()))?;
        let snapshot = game
            .start(&settings, state.words.as_ref(), &state.scheduler)
            .await;
        pending.broadcast(session_id, ServerMessage::GameStarted(snapshot));
        Ok(AckData::Empty)
    }

    /// 处理倒计时
    fn handle_tick(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        session_id: &str,
        epoch: u64,
    ) {
        let Some(game) = state.games.get_mut(session_id) else {
            debug!("会话 {} 已不存在，忽略倒计时", session_id);
            return;
        };

        match game.tick(epoch) {
            Some(Tick::Running(remaining)) => {
                pending.broadcast(session_id, ServerMessage::RemainingTimeUpdated(remaining));
            }
            Some(Tick::Expired(snapshot)) => {
                pending.broadcast(session_id, ServerMessage::RemainingTimeUpdated(0));
                pending.broadcast(
                    session_id,
                    ServerMessage::WordGuessFailed {
                        passed_words: snapshot.passed_words.clone(),
                        game: snapshot,
                    },
                );
            }
            None => {}
        }
    }

    /// 处理连接断开：不立即移除玩家，等待宽限期
    fn handle_disconnect(state: &mut ServerState, connection_id: ConnectionId) {
        let Some(departed) = state.connections.close(connection_id) else {
            return;
        };
        debug!("连接 {} 已断开", connection_id);
        state.schedule_leave(departed);
    }

    /// 处理宽限期结束
    fn handle_grace_expired(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        session_id: SessionId,
        player_id: PlayerId,
        ticket: u64,
    ) {
        let key = (session_id, player_id);
        match state.pending_leaves.get(&key) {
            Some(leave) if leave.timer.ticket() == ticket => {}
            _ => {
                debug!("忽略过期的延迟离开 (ticket {})", ticket);
                return;
            }
        }
        let Some(leave) = state.pending_leaves.remove(&key) else {
            return;
        };
        let (session_id, player_id) = key;

        if leave
            .departed
            .is_still_connected(state.connections.members(&session_id))
        {
            debug!("玩家 {} 已重新连接会话 {}", player_id, session_id);
            return;
        }

        info!("玩家 {} 永久断开会话 {}", player_id, session_id);
        Self::remove_player(state, pending, &session_id, player_id);
    }
}
