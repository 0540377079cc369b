//! 玩家与角色定义

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::MAX_PLAYER_NAME_LEN;
use crate::error::{ProtocolError, Result};

/// 玩家 ID（重连后保持不变）
pub type PlayerId = Uuid;

/// 双人模式中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// 给线索的一方（能看到谜底）
    ClueGiver,
    /// 猜词的一方
    Guesser,
    /// 未分配
    #[default]
    Unknown,
}

impl Role {
    /// 获取互补角色
    ///
    /// 猜词方 ↔ 线索方；未分配的角色视作线索方，补为猜词方。
    pub fn complement(self) -> Role {
        match self {
            Role::Guesser => Role::ClueGiver,
            Role::ClueGiver | Role::Unknown => Role::Guesser,
        }
    }
}

/// 玩家信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
}

impl Player {
    /// 创建新玩家（分配新的 ID）
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role,
        }
    }

    /// 验证玩家名称
    pub fn validate_name(name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProtocolError::PlayerNameEmpty);
        }
        let len = name.chars().count();
        if len > MAX_PLAYER_NAME_LEN {
            return Err(ProtocolError::PlayerNameTooLong {
                len,
                max: MAX_PLAYER_NAME_LEN,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_complement() {
        assert_eq!(Role::Guesser.complement(), Role::ClueGiver);
        assert_eq!(Role::ClueGiver.complement(), Role::Guesser);
        assert_eq!(Role::Unknown.complement(), Role::Guesser);
    }

    #[test]
    fn test_role_wire_name() {
        let json = serde_json::to_string(&Role::ClueGiver).unwrap();
        assert_eq!(json, "\"CLUE_GIVER\"");

        let role: Role = serde_json::from_str("\"GUESSER\"").unwrap();
        assert_eq!(role, Role::Guesser);
    }

    #[test]
    fn test_new_player_unique_id() {
        let a = Player::new("Juan", Role::Guesser);
        let b = Player::new("Juan", Role::Guesser);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_validate_name() {
        assert!(Player::validate_name("Maria").is_ok());

        // 空名称
        assert!(matches!(
            Player::validate_name("   "),
            Err(ProtocolError::PlayerNameEmpty)
        ));

        // 超长名称
        let long_name = "a".repeat(MAX_PLAYER_NAME_LEN + 1);
        assert!(matches!(
            Player::validate_name(&long_name),
            Err(ProtocolError::PlayerNameTooLong { len: 21, max: 20 })
        ));
    }
}
