//! 对局状态
//!
//! 每个会话一局，持有玩家表、回合状态和倒计时句柄。
//! 所有修改都经由本模块的方法完成，调用方拿到的是修改完成后的快照。

use indexmap::IndexMap;
use tracing::{debug, info};

use protocol::{
    GameSettings, GameSnapshot, GameStatus, GameType, Player, PlayerId, Role, SessionId,
    SettingsUpdate,
};

use crate::error::{Result, ServerError};
use crate::timer::{RoundTimer, Scheduler};
use crate::words::WordProvider;

/// 一次倒计时的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// 倒计时继续，附带剩余秒数
    Running(u32),
    /// 时间耗尽，回合以 Lose 结束
    Expired(GameSnapshot),
}

/// 对局
pub struct Game {
    id: SessionId,
    game_type: GameType,
    host_id: Option<PlayerId>,
    /// 按加入顺序排列
    players: IndexMap<PlayerId, Player>,
    status: GameStatus,
    guess_word: Option<String>,
    time_remaining: u32,
    passes_remaining: u32,
    passed_words: Vec<String>,
    settings: GameSettings,
    /// 当前倒计时（最多一个）
    timer: Option<RoundTimer>,
    /// 当前倒计时的代数，由调度器分配
    epoch: u64,
}

impl Game {
    /// 创建新对局
    pub fn new(id: SessionId, game_type: GameType) -> Self {
        Self {
            id,
            game_type,
            host_id: None,
            players: IndexMap::new(),
            status: GameStatus::Pending,
            guess_word: None,
            time_remaining: 0,
            passes_remaining: 0,
            passed_words: Vec::new(),
            settings: GameSettings::default(),
            timer: None,
            epoch: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.players.contains_key(&player_id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    /// 最早加入的玩家
    pub fn first_player(&self) -> Option<&Player> {
        self.players.values().next()
    }

    /// 是否有正在运行的倒计时
    pub fn has_active_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// 添加玩家（同 ID 覆盖，保持原有顺序）
    ///
    /// 还没有房主时，加入者成为房主。
    pub fn add_player(&mut self, player: Player) {
        if self.host_id.is_none() {
            self.host_id = Some(player.id);
        }
        self.players.insert(player.id, player);
    }

    /// 移除玩家，不处理房主交接
    pub fn remove_player(&mut self, player_id: PlayerId) -> Option<Player> {
        self.players.shift_remove(&player_id)
    }

    /// 设置房主
    pub fn set_host(&mut self, player_id: PlayerId) -> Result<()> {
        if !self.players.contains_key(&player_id) {
            return Err(ServerError::HostNotInGame {
                session_id: self.id.clone(),
                player_id,
            });
        }
        self.host_id = Some(player_id);
        Ok(())
    }

    /// 下一个加入者的角色
    pub fn next_role(&self) -> Role {
        self.first_player()
            .map(|p| p.role.complement())
            .unwrap_or(Role::Guesser)
    }

    /// 开始回合
    ///
    /// 先停掉已有的倒计时，再取词并进入 Ongoing，最后启动新的倒计时。
    pub async fn start(
        &mut self,
        update: &SettingsUpdate,
        words: &dyn WordProvider,
        scheduler: &Scheduler,
    ) -> GameSnapshot {
        self.stop_timer();

        self.settings.merge(update);
        self.time_remaining = self.settings.duration;
        self.passes_remaining = self.settings.passes;
        self.guess_word = words.fetch_random_word(&self.settings.languages_used).await;
        self.passed_words.clear();
        self.status = GameStatus::Ongoing;

        self.start_timer(scheduler);
        info!(
            "会话 {} 开始回合: {} 秒, {} 次跳过",
            self.id, self.time_remaining, self.passes_remaining
        );

        self.snapshot()
    }

    /// 处理一次倒计时
    ///
    /// 代数不匹配或不在进行中时忽略，返回 `None`。
    pub fn tick(&mut self, epoch: u64) -> Option<Tick> {
        if epoch != self.epoch || self.timer.is_none() || self.status != GameStatus::Ongoing {
            debug!("会话 {} 忽略过期的倒计时 (epoch {})", self.id, epoch);
            return None;
        }

        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining > 0 {
            return Some(Tick::Running(self.time_remaining));
        }

        self.stop_timer();
        self.status = GameStatus::Lose;
        info!("会话 {} 时间耗尽", self.id);
        Some(Tick::Expired(self.snapshot()))
    }

    /// 跳过当前谜底
    ///
    /// 没有剩余次数或取不到新词时不消耗次数，快照不变。
    pub async fn change_guess_word(&mut self, words: &dyn WordProvider) -> GameSnapshot {
        if self.passes_remaining == 0 {
            debug!("会话 {} 没有剩余跳过次数", self.id);
            return self.snapshot();
        }

        let Some(next) = words.fetch_random_word(&self.settings.languages_used).await else {
            debug!("会话 {} 取不到新谜底，保留当前谜底", self.id);
            return self.snapshot();
        };

        if let Some(current) = self.guess_word.replace(next) {
            self.passed_words.push(current);
        }
        self.passes_remaining -= 1;

        self.snapshot()
    }

    /// 猜中
    pub fn win(&mut self) -> GameSnapshot {
        if self.status.is_in_round() {
            self.stop_timer();
            self.status = GameStatus::Win;
            info!("会话 {} 猜中", self.id);
        }
        self.snapshot()
    }

    /// 暂停（保留剩余时间和谜底）
    pub fn pause(&mut self) -> GameSnapshot {
        if self.status == GameStatus::Ongoing {
            self.stop_timer();
            self.status = GameStatus::Paused;
        }
        self.snapshot()
    }

    /// 从剩余时间继续倒计时
    pub fn resume(&mut self, scheduler: &Scheduler) -> GameSnapshot {
        if self.status == GameStatus::Paused && self.time_remaining > 0 {
            self.stop_timer();
            self.status = GameStatus::Ongoing;
            self.start_timer(scheduler);
        }
        self.snapshot()
    }

    /// 交换所有玩家的角色，不足两人时不变
    pub fn switch_roles(&mut self) -> GameSnapshot {
        if self.players.len() >= 2 {
            for player in self.players.values_mut() {
                player.role = player.role.complement();
            }
        }
        self.snapshot()
    }

    /// 回到大厅
    pub fn reset(&mut self) -> GameSnapshot {
        self.stop_timer();
        self.time_remaining = 0;
        self.passes_remaining = 0;
        self.guess_word = None;
        self.passed_words.clear();
        self.status = GameStatus::Pending;
        self.snapshot()
    }

    /// 对外可见的快照
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            id: self.id.clone(),
            game_type: self.game_type,
            host_id: self.host_id,
            players: self.players.clone(),
            status: self.status,
            guess_word: self.guess_word.clone(),
            time_remaining: self.time_remaining,
            passes_remaining: self.passes_remaining,
            passed_words: self.passed_words.clone(),
            settings: self.settings.clone(),
        }
    }

    fn start_timer(&mut self, scheduler: &Scheduler) {
        let timer = scheduler.round_timer(self.id.clone());
        self.epoch = timer.epoch();
        self.timer = Some(timer);
    }

    fn stop_timer(&mut self) {
        // drop 句柄即停止任务
        self.timer = None;
    }

    #[cfg(test)]
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}
