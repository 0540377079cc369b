//! 连接管理
//!
//! 每条在线连接对应一个 [`ConnectionSession`]，只记录 ID，
//! 每次使用时再到注册表中查找对局。

use std::collections::{BTreeSet, HashMap};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use protocol::{PlayerId, ServerMessage, SessionId};

/// 连接 ID
pub type ConnectionId = u64;

/// 连接与 (会话, 玩家) 的绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSession {
    pub connection_id: ConnectionId,
    session_id: Option<SessionId>,
    player_id: Option<PlayerId>,
}

impl ConnectionSession {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            session_id: None,
            player_id: None,
        }
    }

    /// 已绑定的会话（用于重新绑定时释放旧玩家）
    pub fn with_binding(
        connection_id: ConnectionId,
        session_id: SessionId,
        player_id: PlayerId,
    ) -> Self {
        Self {
            connection_id,
            session_id: Some(session_id),
            player_id: Some(player_id),
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// 当前绑定
    pub fn binding(&self) -> Option<(&SessionId, PlayerId)> {
        Some((self.session_id.as_ref()?, self.player_id?))
    }

    /// 是否绑定到指定玩家
    pub fn is_bound_to(&self, session_id: &str, player_id: PlayerId) -> bool {
        self.session_id.as_deref() == Some(session_id) && self.player_id == Some(player_id)
    }

    fn bind(&mut self, session_id: SessionId, player_id: PlayerId) {
        self.session_id = Some(session_id);
        self.player_id = Some(player_id);
    }

    fn clear(&mut self) {
        self.session_id = None;
        self.player_id = None;
    }

    /// 是否还有任一在线连接绑定到同一 (会话, 玩家)
    pub fn is_still_connected<'a>(
        &self,
        live: impl IntoIterator<Item = &'a ConnectionSession>,
    ) -> bool {
        let Some((session_id, player_id)) = self.binding() else {
            return false;
        };
        live.into_iter()
            .any(|other| other.is_bound_to(session_id, player_id))
    }
}

/// 在线连接
struct LiveConnection {
    session: ConnectionSession,
    sender: mpsc::Sender<ServerMessage>,
}

/// 在线连接表，附带 会话 → 连接 的广播索引
pub struct Connections {
    live: HashMap<ConnectionId, LiveConnection>,
    rooms: HashMap<SessionId, BTreeSet<ConnectionId>>,
}

impl Connections {
    pub fn new() -> Self {
        Self {
            live: HashMap::new(),
            rooms: HashMap::new(),
        }
    }

    /// 登记新连接
    pub fn insert(&mut self, connection_id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        self.live.insert(
            connection_id,
            LiveConnection {
                session: ConnectionSession::new(connection_id),
                sender,
            },
        );
    }

    /// 获取连接的绑定信息
    pub fn session(&self, connection_id: ConnectionId) -> Option<&ConnectionSession> {
        self.live.get(&connection_id).map(|c| &c.session)
    }

    /// 绑定连接并加入会话广播组
    ///
    /// 返回被替换掉的旧绑定（与新绑定相同时返回 `None`）。
    pub fn bind(
        &mut self,
        connection_id: ConnectionId,
        session_id: &str,
        player_id: PlayerId,
    ) -> Option<(SessionId, PlayerId)> {
        let conn = self.live.get_mut(&connection_id)?;
        if conn.session.is_bound_to(session_id, player_id) {
            return None;
        }

        let previous = conn
            .session
            .binding()
            .map(|(s, p)| (s.clone(), p));
        conn.session.bind(session_id.to_string(), player_id);

        if let Some((old_session, _)) = &previous {
            Self::unsubscribe(&mut self.rooms, old_session, connection_id);
        }
        self.rooms
            .entry(session_id.to_string())
            .or_default()
            .insert(connection_id);

        debug!("连接 {} 绑定到会话 {} 玩家 {}", connection_id, session_id, player_id);
        previous
    }

    /// 退出广播组并清除绑定，返回旧绑定
    ///
    /// 连接本身由随后的 [`Connections::close`] 断开，以便先送达确认。
    pub fn clear(&mut self, connection_id: ConnectionId) -> Option<(SessionId, PlayerId)> {
        let conn = self.live.get_mut(&connection_id)?;
        let previous = conn.session.binding().map(|(s, p)| (s.clone(), p));
        conn.session.clear();

        if let Some((session_id, _)) = &previous {
            Self::unsubscribe(&mut self.rooms, session_id, connection_id);
        }
        previous
    }

    /// 移除连接，返回其最后的绑定
    ///
    /// 发送端随之 drop，写任务发完已排队的消息后结束。
    pub fn close(&mut self, connection_id: ConnectionId) -> Option<ConnectionSession> {
        let conn = self.live.remove(&connection_id)?;
        if let Some(session_id) = conn.session.session_id() {
            Self::unsubscribe(&mut self.rooms, session_id, connection_id);
        }
        Some(conn.session)
    }

    /// 会话广播组中的连接
    pub fn members<'a>(
        &'a self,
        session_id: &str,
    ) -> impl Iterator<Item = &'a ConnectionSession> + 'a {
        self.rooms
            .get(session_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.live.get(id))
            .map(|c| &c.session)
    }

    /// 发送消息给指定连接
    pub fn send(&self, connection_id: ConnectionId, msg: ServerMessage) {
        let Some(conn) = self.live.get(&connection_id) else {
            debug!("连接 {} 已断开，丢弃消息", connection_id);
            return;
        };
        match conn.sender.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("连接 {} 发送队列已满，丢弃消息", connection_id);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("连接 {} 发送端已关闭", connection_id);
            }
        }
    }

    /// 广播消息给会话内所有连接
    pub fn broadcast(&self, session_id: &str, msg: ServerMessage) {
        if let Some(ids) = self.rooms.get(session_id) {
            for &connection_id in ids {
                self.send(connection_id, msg.clone());
            }
        }
    }

    fn unsubscribe(
        rooms: &mut HashMap<SessionId, BTreeSet<ConnectionId>>,
        session_id: &str,
        connection_id: ConnectionId,
    ) {
        if let Some(ids) = rooms.get_mut(session_id) {
            ids.remove(&connection_id);
            if ids.is_empty() {
                rooms.remove(session_id);
            }
        }
    }
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}
