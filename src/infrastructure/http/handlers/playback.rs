//! Playback Handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::{
    GetPlaybackState, PlaySoundCommand, PlaySoundResponse, SkipSoundCommand, StopSoundCommand,
};
use crate::domain::{ChannelId, GuildId, UserId};
use crate::infrastructure::http::dto::{ApiResponse, GuildRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::playback::PlaybackState;

// ============================================================================
// Play
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub name: String,
    /// 请求者；未指定频道时播放到其所在语音频道
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Serialize)]
pub struct PlayDto {
    pub name: String,
    pub channel_id: ChannelId,
}

impl From<PlaySoundResponse> for PlayDto {
    fn from(r: PlaySoundResponse) -> Self {
        Self {
            name: r.name,
            channel_id: r.channel_id,
        }
    }
}

/// 播放音效（立即返回，后台播放）
pub async fn play(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayRequest>,
) -> Result<Json<ApiResponse<PlayDto>>, ApiError> {
    let result = state
        .play_handler
        .handle(PlaySoundCommand {
            guild_id: req.guild_id,
            name: req.name,
            user_id: req.user_id,
            channel_id: req.channel_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(result.into())))
}

// ============================================================================
// Skip / Stop
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    pub guild_id: GuildId,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Serialize)]
pub struct SkipDto {
    pub skipped: bool,
    pub next: Option<PlayDto>,
}

pub async fn skip(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SkipRequest>,
) -> Result<Json<ApiResponse<SkipDto>>, ApiError> {
    let result = state
        .skip_handler
        .handle(SkipSoundCommand {
            guild_id: req.guild_id,
            next: req.next,
            user_id: req.user_id,
            channel_id: req.channel_id,
        })
        .await?;

    Ok(Json(ApiResponse::success(SkipDto {
        skipped: result.skipped,
        next: result.next.map(PlayDto::from),
    })))
}

#[derive(Debug, Serialize)]
pub struct StopDto {
    pub stopped: bool,
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuildRequest>,
) -> Result<Json<ApiResponse<StopDto>>, ApiError> {
    let result = state
        .stop_handler
        .handle(StopSoundCommand {
            guild_id: req.guild_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(StopDto {
        stopped: result.stopped,
    })))
}

/// 当前播放状态
pub async fn playback_state(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuildRequest>,
) -> Result<Json<ApiResponse<PlaybackState>>, ApiError> {
    let result = state
        .playback_state_handler
        .handle(GetPlaybackState {
            guild_id: req.guild_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
