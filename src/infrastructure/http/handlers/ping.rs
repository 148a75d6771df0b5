//! Ping Handler
//!
//! 健康检查，同时报告已注册的 guild 数与语音中继状态

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::infrastructure::http::state::AppState;

/// Ping 响应
#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub guilds: usize,
    pub voice_relay: bool,
}

/// Ping endpoint - 健康检查
pub async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        guilds: state.store.guild_ids().len(),
        voice_relay: state.voice_relay.is_attached(),
    })
}
