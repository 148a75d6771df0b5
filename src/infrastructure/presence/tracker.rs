//! Voice Presence Tracker - 语音状态事件处理与入场音触发

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChannelKind, ChatPlatformPort, GuildStorePort, VoiceGatewayPort, VoiceStateChange,
};
use crate::domain::presence::{GuildVoiceMembership, VoiceChannelMembership, VoiceTransition};
use crate::domain::{GuildId, UserId};
use crate::infrastructure::playback::{PlayRequest, PlaybackController};

/// 语音在线状态追踪器
pub struct VoicePresenceTracker {
    platform: Arc<dyn ChatPlatformPort>,
    store: Arc<dyn GuildStorePort>,
    voice: Arc<dyn VoiceGatewayPort>,
    controller: Arc<PlaybackController>,
    entrance_delay: Duration,
    bot_user_id: RwLock<Option<UserId>>,
}

impl VoicePresenceTracker {
    pub fn new(
        platform: Arc<dyn ChatPlatformPort>,
        store: Arc<dyn GuildStorePort>,
        voice: Arc<dyn VoiceGatewayPort>,
        controller: Arc<PlaybackController>,
        entrance_delay: Duration,
    ) -> Self {
        Self {
            platform,
            store,
            voice,
            controller,
            entrance_delay,
            bot_user_id: RwLock::new(None),
        }
    }

    pub fn set_bot_user(&self, user_id: UserId) {
        *self.bot_user_id.write().unwrap_or_else(|e| e.into_inner()) = Some(user_id);
    }

    fn bot_user(&self) -> Option<UserId> {
        *self.bot_user_id.read().unwrap_or_else(|e| e.into_inner())
    }

    /// 处理一次语音状态变化
    ///
    /// 触发入场音时返回播放任务句柄
    pub async fn handle(&self, change: VoiceStateChange) -> Result<Option<JoinHandle<()>>, ApplicationError> {
        if Some(change.user_id) == self.bot_user() {
            if change.to.is_none() {
                self.voice.forget(change.guild_id);
                tracing::info!(guild_id = %change.guild_id, "Bot left voice, connection dropped");
            }
            return Ok(None);
        }
        if change.is_bot {
            return Ok(None);
        }

        if !self.store.has_membership(change.guild_id)? {
            let membership = self.snapshot(change.guild_id).await?;
            self.store.install_membership(change.guild_id, membership)?;
        }

        let transition = VoiceTransition {
            guild_id: change.guild_id,
            user_id: change.user_id,
            from: change.from,
            to: change.to,
        };
        self.store.apply_transition(&transition)?;

        tracing::debug!(
            guild_id = %change.guild_id,
            user_id = %change.user_id,
            kind = ?transition.kind(),
            "Voice transition applied"
        );

        let Some(channel_id) = transition.to.filter(|_| transition.triggers_entrance()) else {
            return Ok(None);
        };
        let Some(sound) = self.store.entrance(change.guild_id, change.user_id)? else {
            return Ok(None);
        };

        let controller = Arc::clone(&self.controller);
        let delay = self.entrance_delay;
        let request = PlayRequest {
            guild_id: change.guild_id,
            channel_id,
            name: format!("entrance/{}", change.user_id),
            sound,
        };
        tracing::info!(
            guild_id = %change.guild_id,
            user_id = %change.user_id,
            "Scheduling entrance sound"
        );
        Ok(Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = controller.play(request).await;
        })))
    }

    /// 拉取完整语音快照，不持有任何状态锁
    async fn snapshot(&self, guild_id: GuildId) -> Result<GuildVoiceMembership, ApplicationError> {
        let channels = self.platform.list_channels(guild_id).await?;
        let occupants = self.platform.list_voice_states(guild_id).await?;

        let voice_channels = channels
            .into_iter()
            .filter(|c| c.kind == ChannelKind::Voice)
            .map(|c| VoiceChannelMembership::new(guild_id, c.id, c.name));
        let humans = occupants
            .into_iter()
            .filter(|o| !o.is_bot)
            .map(|o| (o.user_id, o.channel_id));

        let membership = GuildVoiceMembership::from_snapshot(voice_channels, humans);
        tracing::debug!(
            guild_id = %guild_id,
            channels = membership.channels().count(),
            "Voice membership snapshot taken"
        );
        Ok(membership)
    }
}
