//! 定时任务
//!
//! 回合倒计时与断线宽限期都以事件的形式投递回事件循环，
//! 状态只在事件循环中修改。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use protocol::{PlayerId, SessionId};

use crate::server::ServerEvent;

/// 定时任务调度器
#[derive(Clone)]
pub struct Scheduler {
    events: mpsc::UnboundedSender<ServerEvent>,
    tick_period: Duration,
    grace_period: Duration,
    /// 倒计时代数，所有对局共用，会话被销毁重建后也不会重复
    epochs: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(
        events: mpsc::UnboundedSender<ServerEvent>,
        tick_period: Duration,
        grace_period: Duration,
    ) -> Self {
        Self {
            events,
            tick_period,
            grace_period,
            epochs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 断线宽限期
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// 启动回合倒计时，每个周期投递一次 `Tick`
    ///
    /// 第一次投递发生在一个周期之后。每个倒计时分到一个新的代数。
    pub fn round_timer(&self, session_id: SessionId) -> RoundTimer {
        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;
        let events = self.events.clone();
        let period = self.tick_period;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let event = ServerEvent::Tick {
                    session_id: session_id.clone(),
                    epoch,
                };
                if events.send(event).is_err() {
                    // 事件循环已退出
                    break;
                }
            }
        });

        RoundTimer { handle, epoch }
    }

    /// 宽限期结束后投递 `GraceExpired`
    pub fn deferred_leave(
        &self,
        session_id: SessionId,
        player_id: PlayerId,
        ticket: u64,
    ) -> DeferredLeave {
        let events = self.events.clone();
        let grace_period = self.grace_period;

        let handle = tokio::spawn(async move {
            time::sleep(grace_period).await;
            let _ = events.send(ServerEvent::GraceExpired {
                session_id,
                player_id,
                ticket,
            });
        });

        DeferredLeave { handle, ticket }
    }
}

/// 回合倒计时句柄，drop 即停止
#[derive(Debug)]
pub struct RoundTimer {
    handle: JoinHandle<()>,
    epoch: u64,
}

impl RoundTimer {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 延迟离开句柄，drop 即取消
#[derive(Debug)]
pub struct DeferredLeave {
    handle: JoinHandle<()>,
    ticket: u64,
}

impl DeferredLeave {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl Drop for DeferredLeave {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
