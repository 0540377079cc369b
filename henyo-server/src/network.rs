//! 网络层
//!
//! 每条连接拆成读写两个任务，读到的请求转成 [`ServerEvent`] 交给事件循环，
//! 事件循环的输出经由每连接的有界队列写回。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use protocol::{
    ClientFrame, Connection, ErrorCode, FrameReader, Listener, ProtocolError, ServerMessage,
    TcpConnection, TcpListener,
};

use crate::config::ServerConfig;
use crate::connection::ConnectionId;
use crate::server::{MessageHandler, ServerEvent, ServerState};
use crate::timer::Scheduler;
use crate::words::WordProvider;

/// 每条连接的发送队列长度
const OUTBOUND_QUEUE_SIZE: usize = 256;

/// 游戏服务器
pub struct GameServer {
    config: ServerConfig,
    words: Arc<dyn WordProvider>,
}

impl GameServer {
    pub fn new(config: ServerConfig, words: Arc<dyn WordProvider>) -> Self {
        Self { config, words }
    }

    /// 绑定配置的地址并开始服务
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("无法监听 {}", self.config.bind_addr))?;
        self.serve(listener).await
    }

    /// 在已绑定的监听器上服务
    pub async fn serve(self, mut listener: TcpListener) -> Result<()> {
        info!(
            "服务端监听 {}",
            listener.local_addr().unwrap_or_else(|| self.config.bind_addr.clone())
        );

        let (events, events_rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(
            events.clone(),
            self.config.tick_interval(),
            self.config.grace_period(),
        );
        let state = ServerState::new(self.words.clone(), scheduler);
        tokio::spawn(Self::event_loop(state, events_rx));

        let active = Arc::new(AtomicUsize::new(0));
        let mut next_id: ConnectionId = 0;

        loop {
            let conn = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("接受连接失败: {}", e);
                    continue;
                }
            };

            if active.load(Ordering::SeqCst) >= self.config.max_connections {
                warn!("连接数已满，拒绝 {:?}", conn.peer_addr());
                tokio::spawn(Self::reject(conn));
                continue;
            }

            next_id += 1;
            debug!("连接 {} 来自 {:?}", next_id, conn.peer_addr());

            if let Err(e) = Self::spawn_connection(
                next_id,
                conn,
                events.clone(),
                active.clone(),
                self.config.heartbeat_timeout(),
            ) {
                error!("{:#}", e);
                return Err(e);
            }
        }
    }

    /// 事件循环：唯一修改 [`ServerState`] 的地方
    async fn event_loop(mut state: ServerState, mut events: mpsc::UnboundedReceiver<ServerEvent>) {
        while let Some(event) = events.recv().await {
            MessageHandler::handle_event(&mut state, event).await;
        }
        info!("事件循环退出");
    }

    /// 服务器已满：告知原因后关闭
    async fn reject(mut conn: TcpConnection) {
        let msg = ServerMessage::Error {
            code: ErrorCode::ServerFull,
            message: "Server is full".to_string(),
        };
        if let Err(e) = conn.send(&msg).await {
            debug!("发送拒绝消息失败: {}", e);
        }
    }

    fn spawn_connection(
        connection_id: ConnectionId,
        conn: TcpConnection,
        events: mpsc::UnboundedSender<ServerEvent>,
        active: Arc<AtomicUsize>,
        heartbeat_timeout: Duration,
    ) -> Result<()> {
        let (reader, mut writer) = conn.split();
        let (sender, mut outbound) = mpsc::channel(OUTBOUND_QUEUE_SIZE);

        events
            .send(ServerEvent::Connected {
                connection_id,
                sender,
            })
            .context("事件循环已退出")?;
        active.fetch_add(1, Ordering::SeqCst);

        let reader_task = tokio::spawn(Self::read_loop(
            connection_id,
            reader,
            events.clone(),
            heartbeat_timeout,
        ));

        // 写任务：发送端被事件循环 drop 后发完剩余消息再关闭
        tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                if let Err(e) = writer.write_frame(&msg).await {
                    debug!("连接 {} 写入失败: {}", connection_id, e);
                    break;
                }
            }
            if let Err(e) = writer.shutdown().await {
                debug!("连接 {} 关闭写端失败: {}", connection_id, e);
            }

            reader_task.abort();
            let _ = events.send(ServerEvent::Disconnected { connection_id });
            active.fetch_sub(1, Ordering::SeqCst);
            debug!("连接 {} 已关闭", connection_id);
        });

        Ok(())
    }

    /// 读任务：超过心跳超时没有任何消息视为断开
    async fn read_loop(
        connection_id: ConnectionId,
        mut reader: FrameReader<OwnedReadHalf>,
        events: mpsc::UnboundedSender<ServerEvent>,
        heartbeat_timeout: Duration,
    ) {
        loop {
            let event = match timeout(heartbeat_timeout, reader.read_frame::<ClientFrame>()).await {
                Ok(Ok(frame)) => ServerEvent::Request {
                    connection_id,
                    frame,
                },
                Ok(Err(ProtocolError::Json(e))) => ServerEvent::Malformed {
                    connection_id,
                    reason: e.to_string(),
                },
                Ok(Err(ProtocolError::ConnectionClosed)) => {
                    debug!("连接 {} 对端关闭", connection_id);
                    break;
                }
                Ok(Err(e)) => {
                    warn!("连接 {} 读取失败: {}", connection_id, e);
                    break;
                }
                Err(_) => {
                    info!("连接 {} 心跳超时", connection_id);
                    break;
                }
            };

            if events.send(event).is_err() {
                return;
            }
        }

        let _ = events.send(ServerEvent::Disconnected { connection_id });
    }
}
