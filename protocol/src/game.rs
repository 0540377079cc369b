//! 对局数据结构：类型、状态、设置与快照

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PASSES, DEFAULT_ROUND_DURATION_SECS};
use crate::player::{Player, PlayerId};

/// 会话 ID（可分享的房间码）
pub type SessionId = String;

/// 游戏类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    Classic,
    /// 双人模式（目前唯一支持的模式）
    Duo,
    Battle,
    #[default]
    Unknown,
}

/// 对局状态
///
/// Unknown → Pending → Ongoing ⇄ Paused；Ongoing → Win | Lose；Paused → Win；
/// 回到大厅后重新进入 Pending。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    #[default]
    Unknown,
    /// 大厅中，等待开局
    Pending,
    /// 倒计时进行中
    Ongoing,
    /// 已暂停
    Paused,
    /// 猜中
    Win,
    /// 超时
    Lose,
}

impl GameStatus {
    /// 是否处于回合中（进行或暂停）
    pub fn is_in_round(self) -> bool {
        matches!(self, GameStatus::Ongoing | GameStatus::Paused)
    }
}

/// 谜底语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    English,
    Tagalog,
}

/// 回合设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    /// 回合时长（秒）
    pub duration: u32,
    /// 可跳过次数
    pub passes: u32,
    /// 谜底使用的语言（非空）
    pub languages_used: Vec<Language>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            duration: DEFAULT_ROUND_DURATION_SECS,
            passes: DEFAULT_PASSES,
            languages_used: vec![Language::English, Language::Tagalog],
        }
    }
}

impl GameSettings {
    /// 合并房主提交的部分设置
    ///
    /// 时长为 0 或语言列表为空时保留原值。
    pub fn merge(&mut self, update: &SettingsUpdate) {
        if let Some(duration) = update.duration.filter(|d| *d > 0) {
            self.duration = duration;
        }
        if let Some(passes) = update.passes {
            self.passes = passes;
        }
        if let Some(languages) = &update.languages_used {
            let mut deduped: Vec<Language> = Vec::with_capacity(languages.len());
            for language in languages {
                if !deduped.contains(language) {
                    deduped.push(*language);
                }
            }
            if !deduped.is_empty() {
                self.languages_used = deduped;
            }
        }
    }
}

/// 开局时提交的部分设置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub duration: Option<u32>,
    pub passes: Option<u32>,
    pub languages_used: Option<Vec<Language>>,
}

/// 对局快照（用于广播和测试断言）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub id: SessionId,
    #[serde(rename = "type")]
    pub game_type: GameType,
    pub host_id: Option<PlayerId>,
    /// 按加入顺序排列
    pub players: IndexMap<PlayerId, Player>,
    pub status: GameStatus,
    pub guess_word: Option<String>,
    pub time_remaining: u32,
    pub passes_remaining: u32,
    pub passed_words: Vec<String>,
    pub settings: GameSettings,
}

impl GameSnapshot {
    /// 获取玩家
    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }
}
