//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping               GET   健康检查
//! - /api/sound/list         POST  列出音效
//! - /api/sound/find         POST  查找音效（附跳转链接）
//! - /api/sound/volume       POST  调整音量
//! - /api/sound/rename       POST  重命名音效
//! - /api/sound/rebuild      POST  重建目录
//! - /api/entrance/set       POST  设置入场音
//! - /api/playback/play      POST  播放
//! - /api/playback/skip      POST  跳过（可指定下一个）
//! - /api/playback/stop      POST  停止
//! - /api/playback/state     POST  播放状态
//! - /api/voice/channels     POST  语音频道成员
//! - /api/voice/connect      POST  加入请求者所在语音频道
//! - /ws/gateway             WS    网关中继事件
//! - /ws/voice               WS    语音中继

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/gateway", get(handlers::gateway_websocket_handler))
        .route("/ws/voice", get(handlers::voice_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/sound", sound_routes())
        .route("/entrance/set", post(handlers::set_entrance))
        .nest("/playback", playback_routes())
        .nest("/voice", voice_routes())
}

/// Sound 路由
fn sound_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/list", post(handlers::list_sounds))
        .route("/find", post(handlers::find_sound))
        .route("/volume", post(handlers::adjust_volume))
        .route("/rename", post(handlers::rename_sound))
        .route("/rebuild", post(handlers::rebuild))
}

/// Voice 路由
fn voice_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/channels", post(handlers::voice_channels))
        .route("/connect", post(handlers::connect))
}

/// Playback 路由
fn playback_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/play", post(handlers::play))
        .route("/skip", post(handlers::skip))
        .route("/stop", post(handlers::stop))
        .route("/state", post(handlers::playback_state))
}
