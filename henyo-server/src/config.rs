//! 服务端配置
//!
//! 默认值 → 配置文件 → 环境变量，后者覆盖前者。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use protocol::{
    DISCONNECT_GRACE_PERIOD_SECS, HEARTBEAT_TIMEOUT_SECS, MAX_CONNECTIONS, TICK_INTERVAL_MS,
};

/// 服务端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_addr: String,
    /// 最大连接数
    pub max_connections: usize,
    /// 断线宽限期（秒）
    pub grace_period_secs: u64,
    /// 倒计时间隔（毫秒）
    pub tick_interval_ms: u64,
    /// 心跳超时（秒）
    pub heartbeat_timeout_secs: u64,
    /// 词库文件，未配置时使用内置词表
    pub words_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            max_connections: MAX_CONNECTIONS,
            grace_period_secs: DISCONNECT_GRACE_PERIOD_SECS,
            tick_interval_ms: TICK_INTERVAL_MS,
            heartbeat_timeout_secs: HEARTBEAT_TIMEOUT_SECS,
            words_path: None,
        }
    }
}

impl ServerConfig {
    /// 获取配置文件路径
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os("HENYO_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|mut path| {
            path.push("henyo");
            path.push("server.json");
            path
        })
    }

    /// 加载配置：文件无效时使用默认值，然后应用环境变量
    pub fn load() -> Self {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => {
                    info!("已加载配置: {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("{:#}，使用默认配置", e);
                    Self::default()
                }
            },
            Some(_) => {
                info!("配置文件不存在，使用默认配置");
                Self::default()
            }
            None => {
                warn!("无法获取配置目录，使用默认配置");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// 从文件读取配置
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式无效: {:?}", path))
    }

    /// 应用环境变量覆盖
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT") {
            self.bind_addr = format!("0.0.0.0:{}", port.trim());
        }
        if let Some(addr) = lookup("HENYO_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(secs) = lookup("HENYO_GRACE_PERIOD_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.grace_period_secs = secs,
                Err(_) => warn!("HENYO_GRACE_PERIOD_SECS 无效: {}", secs),
            }
        }
        if let Some(path) = lookup("HENYO_WORDS_PATH") {
            self.words_path = Some(PathBuf::from(path));
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}
