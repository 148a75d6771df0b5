//! Voice Handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::{ConnectCommand, GetVoiceChannels};
use crate::domain::presence::VoiceChannelMembership;
use crate::domain::{ChannelId, GuildId, UserId};
use crate::infrastructure::http::dto::{ApiResponse, GuildRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 语音频道及其在线成员
pub async fn voice_channels(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuildRequest>,
) -> Result<Json<ApiResponse<Vec<VoiceChannelMembership>>>, ApiError> {
    let channels = state
        .voice_channels_handler
        .handle(GetVoiceChannels {
            guild_id: req.guild_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(channels)))
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub guild_id: GuildId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Serialize)]
pub struct ConnectDto {
    pub channel_id: ChannelId,
}

/// 加入请求者所在的语音频道（等待连接就绪）
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ApiResponse<ConnectDto>>, ApiError> {
    let result = state
        .connect_handler
        .handle(ConnectCommand {
            guild_id: req.guild_id,
            user_id: req.user_id,
            channel_id: req.channel_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(ConnectDto {
        channel_id: result.channel_id,
    })))
}
