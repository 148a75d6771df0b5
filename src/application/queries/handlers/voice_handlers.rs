//! Voice Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::GuildStorePort;
use crate::application::queries::{GetPlaybackState, GetVoiceChannels};
use crate::domain::presence::VoiceChannelMembership;
use crate::infrastructure::playback::{PlaybackController, PlaybackState};

/// GetVoiceChannels Handler
pub struct GetVoiceChannelsHandler {
    store: Arc<dyn GuildStorePort>,
}

impl GetVoiceChannelsHandler {
    pub fn new(store: Arc<dyn GuildStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: GetVoiceChannels) -> Result<Vec<VoiceChannelMembership>, ApplicationError> {
        Ok(self.store.voice_channels(query.guild_id)?)
    }
}

/// GetPlaybackState Handler
pub struct GetPlaybackStateHandler {
    store: Arc<dyn GuildStorePort>,
    controller: Arc<PlaybackController>,
}

impl GetPlaybackStateHandler {
    pub fn new(store: Arc<dyn GuildStorePort>, controller: Arc<PlaybackController>) -> Self {
        Self { store, controller }
    }

    pub async fn handle(&self, query: GetPlaybackState) -> Result<PlaybackState, ApplicationError> {
        if !self.store.contains(query.guild_id) {
            return Err(ApplicationError::not_found("Guild", query.guild_id));
        }
        Ok(self.controller.state(query.guild_id))
    }
}
