//! clipdeck - 群聊平台音效板服务
//!
//! - Domain: tags/, sound/, presence/
//! - Application: commands, queries, ports
//! - Infrastructure: http, memory, playback, presence, worker, events, adapters

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use clipdeck::config::{load_config, print_config, LogConfig};
use clipdeck::infrastructure::adapters::{
    GatewayCache, HttpPlatformClient, RelayVoiceGateway, SymphoniaOpusEncoder,
};
use clipdeck::infrastructure::events::EventDispatcher;
use clipdeck::infrastructure::http::{AppState, HttpServer};
use clipdeck::infrastructure::memory::InMemoryGuildStore;
use clipdeck::infrastructure::playback::PlaybackController;
use clipdeck::infrastructure::presence::VoicePresenceTracker;
use clipdeck::infrastructure::worker::{RebuildWorker, SoundIndexBuilder};

fn init_tracing(log: &LogConfig) {
    let log_filter = format!("{},clipdeck={},tower_http=debug", log.level, log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config.log);

    tracing::info!("clipdeck - soundboard service");
    print_config(&config);

    if config.platform.token.is_empty() {
        tracing::warn!("Platform token is empty, REST calls will be rejected");
    }

    // 外部协作方
    let gateway = GatewayCache::new().arc();
    let platform = Arc::new(HttpPlatformClient::new(
        config.platform.client_config(),
        gateway.clone(),
    )?);
    let voice_relay = Arc::new(RelayVoiceGateway::default());
    let encoder = Arc::new(SymphoniaOpusEncoder::new(config.platform.timeout_secs)?);

    // 状态与核心组件
    let store = InMemoryGuildStore::new().arc();
    let controller = Arc::new(PlaybackController::new(
        store.clone(),
        voice_relay.clone(),
        encoder,
        config.playback.controller_config(),
    ));
    let builder = Arc::new(SoundIndexBuilder::new(
        platform.clone(),
        store.clone(),
        config.soundboard.index_config(),
    ));
    let tracker = Arc::new(VoicePresenceTracker::new(
        platform.clone(),
        store.clone(),
        voice_relay.clone(),
        controller.clone(),
        config.playback.entrance_delay(),
    ));
    let dispatcher = Arc::new(EventDispatcher::new(
        platform.clone(),
        store.clone(),
        builder.clone(),
        tracker,
        config.soundboard.dispatcher_config(),
    ));

    // 定期重建
    let shutdown = CancellationToken::new();
    if config.soundboard.rebuild_interval_secs > 0 {
        let worker = RebuildWorker::new(
            builder.clone(),
            Duration::from_secs(config.soundboard.rebuild_interval_secs),
            shutdown.clone(),
        );
        tokio::spawn(worker.run());
    }

    // 创建 HTTP 服务器
    let state = AppState::new(
        platform,
        store,
        voice_relay.clone(),
        controller,
        builder,
        dispatcher,
        gateway,
        voice_relay,
    );
    let server = HttpServer::new(&config.server, state);

    // 启动服务器（带优雅关闭）
    let signal_token = shutdown.clone();
    server
        .run_with_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    tracing::info!("Server shutdown complete");

    Ok(())
}
