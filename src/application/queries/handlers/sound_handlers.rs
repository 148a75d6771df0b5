//! Sound Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::GuildStorePort;
use crate::application::queries::{FindSound, ListSounds};
use crate::domain::{ChannelId, GuildId, MessageId};

const MESSAGE_LINK_BASE: &str = "https://discord.com/channels";

/// 跳转到音效消息的链接
pub fn message_link(guild_id: GuildId, channel_id: ChannelId, message_id: MessageId) -> String {
    format!("{}/{}/{}/{}", MESSAGE_LINK_BASE, guild_id, channel_id, message_id)
}

// ============================================================================
// Response DTOs
// ============================================================================

/// 音效详情
#[derive(Debug, Clone)]
pub struct SoundResponse {
    pub name: String,
    pub message_id: MessageId,
    pub url: String,
    pub volume: u16,
    pub percent: u16,
    pub link: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// FindSound Handler
pub struct FindSoundHandler {
    store: Arc<dyn GuildStorePort>,
}

impl FindSoundHandler {
    pub fn new(store: Arc<dyn GuildStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: FindSound) -> Result<SoundResponse, ApplicationError> {
        let channels = self.store.channels(query.guild_id)?;
        let sound = self
            .store
            .find_sound(query.guild_id, &query.name)?
            .ok_or_else(|| ApplicationError::not_found("Sound", &query.name))?;

        Ok(SoundResponse {
            link: message_link(query.guild_id, channels.sounds_channel, sound.message_id),
            name: query.name,
            message_id: sound.message_id,
            url: sound.url,
            volume: sound.volume.value(),
            percent: sound.volume.percent(),
        })
    }
}

/// ListSounds Handler
pub struct ListSoundsHandler {
    store: Arc<dyn GuildStorePort>,
}

impl ListSoundsHandler {
    pub fn new(store: Arc<dyn GuildStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: ListSounds) -> Result<Vec<String>, ApplicationError> {
        Ok(self.store.list_sounds(query.guild_id)?)
    }
}
