//! Guild State Store Port - 每个 guild 的内存状态
//!
//! 所有访问都经过加锁的访问器完成，调用方拿不到内部引用，
//! 具体实现在 infrastructure/memory 层

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::presence::{GuildVoiceMembership, VoiceChannelMembership, VoiceTransition};
use crate::domain::sound::{CatalogSnapshot, Sound, Volume};
use crate::domain::{ChannelId, GuildId, UserId};

/// Store 错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Guild not registered: {0}")]
    GuildNotFound(GuildId),

    #[error("Sound not found: {0}")]
    SoundNotFound(String),

    #[error("Sound already exists: {0}")]
    SoundExists(String),
}

/// guild 注册信息（会话就绪时由频道列表得出）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuildSetup {
    pub guild_id: GuildId,
    pub sounds_channel: ChannelId,
    pub commands_channel: Option<ChannelId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuildChannels {
    pub sounds_channel: ChannelId,
    pub commands_channel: Option<ChannelId>,
}

/// 当前播放尝试的句柄
///
/// 每次播放都有独立的取消令牌，停止信号不会泄漏到下一次播放
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    pub id: Uuid,
    pub sound_name: String,
    pub channel_id: ChannelId,
    pub token: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl PlaybackHandle {
    pub fn new(sound_name: impl Into<String>, channel_id: ChannelId) -> Self {
        Self {
            id: Uuid::new_v4(),
            sound_name: sound_name.into(),
            channel_id,
            token: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }
}

/// Guild State Store Port
///
/// 实现必须保证：同一 guild 的所有访问串行化，不同 guild 之间互不阻塞；
/// 任何方法都不能持锁跨越 await
pub trait GuildStorePort: Send + Sync {
    /// 注册 guild；已存在时只更新频道信息，保留目录
    fn register(&self, setup: GuildSetup);

    fn guild_ids(&self) -> Vec<GuildId>;

    fn contains(&self, guild_id: GuildId) -> bool;

    fn channels(&self, guild_id: GuildId) -> Result<GuildChannels, StoreError>;

    // ---- 音效目录 ----

    fn find_sound(&self, guild_id: GuildId, name: &str) -> Result<Option<Sound>, StoreError>;

    /// 所有音效名称，升序
    fn list_sounds(&self, guild_id: GuildId) -> Result<Vec<String>, StoreError>;

    /// 新增或覆盖一个音效
    fn upsert_sound(&self, guild_id: GuildId, name: &str, sound: Sound) -> Result<(), StoreError>;

    /// 移除音效，同时移除指向该消息的入场音绑定
    fn remove_sound(&self, guild_id: GuildId, name: &str) -> Result<Option<Sound>, StoreError>;

    /// 用新记录替换同名音效，指向旧消息的入场音绑定一并改指
    fn replace_sound(&self, guild_id: GuildId, name: &str, sound: Sound) -> Result<(), StoreError>;

    /// 改名并替换记录
    fn rename_sound(
        &self,
        guild_id: GuildId,
        name: &str,
        new_name: &str,
        sound: Sound,
    ) -> Result<(), StoreError>;

    fn set_volume(&self, guild_id: GuildId, name: &str, volume: Volume) -> Result<Sound, StoreError>;

    // ---- 入场音 ----

    fn entrance(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<Sound>, StoreError>;

    /// 绑定入场音，返回被替换的旧绑定
    fn bind_entrance(&self, guild_id: GuildId, user_id: UserId, sound: Sound) -> Result<Option<Sound>, StoreError>;

    fn unbind_entrance(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<Sound>, StoreError>;

    /// 原子替换目录与入场音绑定（重建结果）
    fn install_snapshot(&self, guild_id: GuildId, snapshot: CatalogSnapshot) -> Result<(), StoreError>;

    fn last_rebuild(&self, guild_id: GuildId) -> Result<Option<DateTime<Utc>>, StoreError>;

    // ---- 语音在线状态 ----

    fn has_membership(&self, guild_id: GuildId) -> Result<bool, StoreError>;

    fn install_membership(&self, guild_id: GuildId, membership: GuildVoiceMembership) -> Result<(), StoreError>;

    fn apply_transition(&self, transition: &VoiceTransition) -> Result<(), StoreError>;

    /// 语音频道列表，按频道 ID 排序
    fn voice_channels(&self, guild_id: GuildId) -> Result<Vec<VoiceChannelMembership>, StoreError>;

    fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<ChannelId>, StoreError>;

    // ---- 播放句柄 ----

    fn set_playback(&self, guild_id: GuildId, handle: PlaybackHandle) -> Result<(), StoreError>;

    fn playback(&self, guild_id: GuildId) -> Result<Option<PlaybackHandle>, StoreError>;

    /// 仅当当前句柄 ID 匹配时清除
    fn clear_playback(&self, guild_id: GuildId, id: Uuid) -> Result<bool, StoreError>;
}
