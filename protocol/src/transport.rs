//! 传输层抽象
//!
//! 提供 Connector/Connection/Listener traits 使上层协议与具体传输实现解耦。
//! 帧格式：1 字节版本 + 4 字节大端长度 + JSON 消息体。

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{ProtocolError, Result};
use crate::{CONNECT_TIMEOUT, MAX_FRAME_SIZE, PROTOCOL_VERSION};

/// 连接抽象 trait（核心抽象，用于业务层）
#[async_trait]
pub trait Connection: Send + Sync {
    /// 发送消息
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()>;

    /// 接收消息
    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M>;

    /// 获取远端地址
    fn peer_addr(&self) -> Option<String>;
}

/// 连接器 trait（客户端使用）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// 监听器 trait（服务端使用）
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection;

    /// 绑定地址
    async fn bind(addr: &str) -> Result<Self>;

    /// 接受连接
    async fn accept(&mut self) -> Result<Self::Conn>;

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;

        TcpConnection::from_stream(stream)
    }
}

/// TCP 连接
pub struct TcpConnection {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    peer_addr: Option<String>,
}

impl TcpConnection {
    /// 从 TcpStream 创建
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            peer_addr,
        })
    }

    /// 分离读写端
    pub fn split(self) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()> {
        self.writer.write_frame(msg).await
    }

    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        self.reader.read_frame().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (stream, _addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        TcpConnection::from_stream(stream)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// 帧编解码
// ============================================================================

/// 帧头大小: 1 字节版本 + 4 字节长度
const HEADER_SIZE: usize = 5;

fn map_eof(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(e)
    }
}

/// 帧读取器
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    /// 创建新的帧读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }

    /// 读取并解码一帧消息
    ///
    /// 消息体无法解析时返回 [`ProtocolError::Json`]，此时整帧已被消费，
    /// 可以继续读取下一帧。
    pub async fn read_frame<M: DeserializeOwned>(&mut self) -> Result<M> {
        // 读取帧头
        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header).await.map_err(map_eof)?;

        // 解析版本号
        let version = header[0];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: version,
            });
        }

        // 解析长度（大端序）
        let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

        // 检查帧大小
        if length > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: MAX_FRAME_SIZE,
            });
        }

        // 读取消息体
        if self.buffer.len() < length {
            self.buffer.resize(length, 0);
        }
        self.reader
            .read_exact(&mut self.buffer[..length])
            .await
            .map_err(map_eof)?;

        // 反序列化
        let msg = serde_json::from_slice(&self.buffer[..length])?;
        Ok(msg)
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// 创建新的帧写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 编码并写入一帧消息
    pub async fn write_frame<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        // 序列化消息
        let payload = serde_json::to_vec(msg)?;

        // 检查大小
        if payload.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        // 构造帧头
        let length = payload.len() as u32;
        let mut header = [0u8; HEADER_SIZE];
        header[0] = PROTOCOL_VERSION;
        header[1..5].copy_from_slice(&length.to_be_bytes());

        // 写入帧头和消息体
        self.writer.write_all(&header).await?;
        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// 关闭写端
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ClientFrame, ClientMessage, ServerMessage};

    #[tokio::test]
    async fn test_tcp_connection() {
        // 启动监听
        let mut listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // 客户端连接
        let client_handle = tokio::spawn(async move {
            let connector = TcpConnector;
            let mut conn = connector.connect(&addr).await.unwrap();

            // 发送消息
            conn.send(&ClientFrame::with_ack(
                1,
                ClientMessage::EnterGame {
                    session_id: "ABCD".to_string(),
                },
            ))
            .await
            .unwrap();

            // 接收响应
            let msg: ServerMessage = conn.recv().await.unwrap();
            assert_eq!(msg, ServerMessage::Pong);
        });

        // 服务端接受连接
        let mut conn = listener.accept().await.unwrap();
        assert!(conn.peer_addr().is_some());

        // 接收消息
        let frame: ClientFrame = conn.recv().await.unwrap();
        assert_eq!(frame.ack, Some(1));
        match frame.request {
            ClientMessage::EnterGame { session_id } => assert_eq!(session_id, "ABCD"),
            _ => panic!("Unexpected message"),
        }

        // 发送响应
        conn.send(&ServerMessage::Pong).await.unwrap();

        client_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let (client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        let mut raw = client;
        raw.write_all(&[PROTOCOL_VERSION + 1, 0, 0, 0, 2]).await.unwrap();
        raw.write_all(b"{}").await.unwrap();

        let result: Result<ServerMessage> = reader.read_frame().await;
        assert!(matches!(
            result,
            Err(ProtocolError::VersionMismatch { actual: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_frame_too_large() {
        let (client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        let mut raw = client;
        let length = (MAX_FRAME_SIZE as u32 + 1).to_be_bytes();
        raw.write_all(&[PROTOCOL_VERSION, length[0], length[1], length[2], length[3]])
            .await
            .unwrap();

        let result: Result<ServerMessage> = reader.read_frame().await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_invalid_json_keeps_stream_usable() {
        let (client, server) = tokio::io::duplex(4096);
        let mut reader = FrameReader::new(server);
        let mut raw = client;

        // 一帧非法 JSON
        raw.write_all(&[PROTOCOL_VERSION, 0, 0, 0, 3]).await.unwrap();
        raw.write_all(b"{x}").await.unwrap();

        // 紧接一帧合法消息
        let mut writer = FrameWriter::new(raw);
        writer.write_frame(&ServerMessage::Pong).await.unwrap();

        let first: Result<ServerMessage> = reader.read_frame().await;
        assert!(matches!(first, Err(ProtocolError::Json(_))));

        let second: ServerMessage = reader.read_frame().await.unwrap();
        assert_eq!(second, ServerMessage::Pong);
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(server);
        drop(client);

        let result: Result<ServerMessage> = reader.read_frame().await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }
}
