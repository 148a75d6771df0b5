//! Playback Commands - 播放控制命令

use crate::domain::{ChannelId, GuildId, UserId};

/// 播放音效
///
/// 目标频道优先级：显式频道 → 请求者所在频道 → 机器人当前连接
#[derive(Debug, Clone)]
pub struct PlaySoundCommand {
    pub guild_id: GuildId,
    pub name: String,
    pub user_id: Option<UserId>,
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Clone)]
pub struct PlaySoundResponse {
    pub name: String,
    pub channel_id: ChannelId,
}

/// 跳过当前播放，可选地接着播放另一个音效
#[derive(Debug, Clone)]
pub struct SkipSoundCommand {
    pub guild_id: GuildId,
    pub next: Option<String>,
    pub user_id: Option<UserId>,
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Clone)]
pub struct SkipSoundResponse {
    pub skipped: bool,
    pub next: Option<PlaySoundResponse>,
}

/// 停止当前播放
#[derive(Debug, Clone)]
pub struct StopSoundCommand {
    pub guild_id: GuildId,
}

#[derive(Debug, Clone)]
pub struct StopSoundResponse {
    pub stopped: bool,
}

/// 加入请求者所在的语音频道，不播放
#[derive(Debug, Clone)]
pub struct ConnectCommand {
    pub guild_id: GuildId,
    pub user_id: Option<UserId>,
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Clone)]
pub struct ConnectResponse {
    pub channel_id: ChannelId,
}
