//! Entrance Handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::SetEntranceCommand;
use crate::domain::{GuildId, MessageId, UserId};
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetEntranceRequest {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct EntranceDto {
    pub name: String,
    pub message_id: MessageId,
    pub previous: Option<MessageId>,
}

/// 设置入场音
pub async fn set_entrance(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetEntranceRequest>,
) -> Result<Json<ApiResponse<EntranceDto>>, ApiError> {
    let result = state
        .set_entrance_handler
        .handle(SetEntranceCommand {
            guild_id: req.guild_id,
            user_id: req.user_id,
            name: req.name,
        })
        .await?;

    Ok(Json(ApiResponse::success(EntranceDto {
        name: result.name,
        message_id: result.message_id,
        previous: result.previous,
    })))
}
