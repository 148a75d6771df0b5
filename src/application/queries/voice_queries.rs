//! Voice Queries

use crate::domain::GuildId;

/// 语音频道与成员
#[derive(Debug, Clone)]
pub struct GetVoiceChannels {
    pub guild_id: GuildId,
}

/// 当前播放状态
#[derive(Debug, Clone)]
pub struct GetPlaybackState {
    pub guild_id: GuildId,
}
