//! 会话注册表

use std::collections::HashMap;

use tracing::info;

use protocol::{GameType, SessionId};

use crate::game::Game;

/// 会话注册表：会话 ID → 对局，对局的创建与销毁只经过这里
pub struct SessionRegistry {
    games: HashMap<SessionId, Game>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            games: HashMap::new(),
        }
    }

    /// 获取对局
    pub fn get(&self, session_id: &str) -> Option<&Game> {
        self.games.get(session_id)
    }

    /// 获取对局（可变）
    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut Game> {
        self.games.get_mut(session_id)
    }

    /// 不存在时创建对局，已存在时返回原对局
    pub fn create(&mut self, session_id: &str, game_type: GameType) -> &mut Game {
        self.games.entry(session_id.to_string()).or_insert_with(|| {
            info!("创建会话 {} ({:?})", session_id, game_type);
            Game::new(session_id.to_string(), game_type)
        })
    }

    /// 移除对局
    pub fn remove(&mut self, session_id: &str) -> Option<Game> {
        let game = self.games.remove(session_id);
        if game.is_some() {
            info!("销毁会话 {}", session_id);
        }
        game
    }

    /// 获取对局数量
    pub fn count(&self) -> usize {
        self.games.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
