//! Sound Handlers - 音效目录查询与修改

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::{
    AdjustVolumeCommand, FindSound, ListSounds, RebuildCommand, RenameSoundCommand,
};
use crate::domain::{GuildId, MessageId};
use crate::infrastructure::http::dto::{ApiResponse, GuildRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::worker::RebuildSummary;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FindSoundRequest {
    pub guild_id: GuildId,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SoundDto {
    pub name: String,
    pub message_id: MessageId,
    pub url: String,
    pub volume: u16,
    pub percent: u16,
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct SoundListDto {
    pub total: usize,
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustVolumeRequest {
    pub guild_id: GuildId,
    pub name: String,
    pub volume: i64,
}

#[derive(Debug, Serialize)]
pub struct VolumeDto {
    pub name: String,
    pub message_id: MessageId,
    pub volume: u16,
    pub percent: u16,
}

#[derive(Debug, Deserialize)]
pub struct RenameSoundRequest {
    pub guild_id: GuildId,
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Serialize)]
pub struct RenameDto {
    pub name: String,
    pub message_id: MessageId,
}

// ============================================================================
// Handlers
// ============================================================================

/// 列出音效（按名称升序）
pub async fn list_sounds(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuildRequest>,
) -> Result<Json<ApiResponse<SoundListDto>>, ApiError> {
    let names = state
        .list_sounds_handler
        .handle(ListSounds {
            guild_id: req.guild_id,
        })
        .await?;

    Ok(Json(ApiResponse::success(SoundListDto {
        total: names.len(),
        names,
    })))
}

/// 查找音效，附带消息跳转链接
pub async fn find_sound(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FindSoundRequest>,
) -> Result<Json<ApiResponse<SoundDto>>, ApiError> {
    let sound = state
        .find_sound_handler
        .handle(FindSound {
            guild_id: req.guild_id,
            name: req.name,
        })
        .await?;

    Ok(Json(ApiResponse::success(SoundDto {
        name: sound.name,
        message_id: sound.message_id,
        url: sound.url,
        volume: sound.volume,
        percent: sound.percent,
        link: sound.link,
    })))
}

/// 调整音量
pub async fn adjust_volume(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdjustVolumeRequest>,
) -> Result<Json<ApiResponse<VolumeDto>>, ApiError> {
    let result = state
        .adjust_volume_handler
        .handle(AdjustVolumeCommand {
            guild_id: req.guild_id,
            name: req.name,
            volume: req.volume,
        })
        .await?;

    Ok(Json(ApiResponse::success(VolumeDto {
        name: result.name,
        message_id: result.message_id,
        volume: result.volume,
        percent: result.percent,
    })))
}

/// 重命名音效
pub async fn rename_sound(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RenameSoundRequest>,
) -> Result<Json<ApiResponse<RenameDto>>, ApiError> {
    let result = state
        .rename_sound_handler
        .handle(RenameSoundCommand {
            guild_id: req.guild_id,
            name: req.name,
            new_name: req.new_name,
        })
        .await?;

    Ok(Json(ApiResponse::success(RenameDto {
        name: result.name,
        message_id: result.message_id,
    })))
}

/// 重建目录
pub async fn rebuild(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuildRequest>,
) -> Result<Json<ApiResponse<RebuildSummary>>, ApiError> {
    let summary = state
        .rebuild_handler
        .handle(RebuildCommand {
            guild_id: req.guild_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}
