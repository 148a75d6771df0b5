//! Sound Commands - 音效目录相关命令

use crate::domain::{GuildId, MessageId, UserId};

/// 把音效设为用户的入场音
#[derive(Debug, Clone)]
pub struct SetEntranceCommand {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SetEntranceResponse {
    pub name: String,
    pub message_id: MessageId,
    /// 被替换的旧入场音所在消息
    pub previous: Option<MessageId>,
}

/// 调整音效音量（0-512）
#[derive(Debug, Clone)]
pub struct AdjustVolumeCommand {
    pub guild_id: GuildId,
    pub name: String,
    pub volume: i64,
}

#[derive(Debug, Clone)]
pub struct AdjustVolumeResponse {
    pub name: String,
    pub message_id: MessageId,
    pub volume: u16,
    pub percent: u16,
}

/// 重命名音效
#[derive(Debug, Clone)]
pub struct RenameSoundCommand {
    pub guild_id: GuildId,
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Clone)]
pub struct RenameSoundResponse {
    pub name: String,
    pub message_id: MessageId,
}

/// 立即重建目录
#[derive(Debug, Clone)]
pub struct RebuildCommand {
    pub guild_id: GuildId,
}
