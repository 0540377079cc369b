use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use henyo_server::{GameServer, ServerConfig, WordBank, WordProvider};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("henyo_server=debug".parse()?))
        .init();

    info!("Pinoy Henyo 服务端启动中...");

    let config = ServerConfig::load();

    let bank = match &config.words_path {
        Some(path) => WordBank::load(path).unwrap_or_else(|e| {
            warn!("{:#}，使用内置词表", e);
            WordBank::builtin()
        }),
        None => WordBank::builtin(),
    };
    info!("词库共 {} 个谜底", bank.len());
    let words: Arc<dyn WordProvider> = Arc::new(bank);

    tokio::select! {
        result = GameServer::new(config, words).run() => result?,
        _ = tokio::signal::ctrl_c() => info!("收到退出信号"),
    }

    Ok(())
}
