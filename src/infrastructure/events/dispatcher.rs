//! Event Dispatcher - 入站平台事件分发
//!
//! - SessionReady: 注册 guild 并重建目录
//! - MessageCreated: 音效频道内的增量更新与频道清理
//! - VoiceStateChanged: 交给语音在线状态追踪器

use std::sync::Arc;
use std::time::Duration;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChannelKind, ChatPlatformPort, GuildSetup, GuildStorePort, PlatformEvent,
};
use crate::domain::sound::{parse_sound_message, IndexIssue};
use crate::domain::{ChatMessage, GuildId, UserId};
use crate::infrastructure::presence::VoicePresenceTracker;
use crate::infrastructure::worker::SoundIndexBuilder;

/// 非文件消息的提示语
pub const FILES_ONLY_NOTICE: &str = "Please use this channel for files only";

/// Dispatcher 配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub sounds_channel: String,
    pub commands_channel: String,
    /// 提示消息与原消息在此延迟后一起删除
    pub hygiene_delete_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            sounds_channel: "sounds".to_string(),
            commands_channel: "bot-commands".to_string(),
            hygiene_delete_delay: Duration::from_secs(3),
        }
    }
}

/// 事件分发器
pub struct EventDispatcher {
    platform: Arc<dyn ChatPlatformPort>,
    store: Arc<dyn GuildStorePort>,
    builder: Arc<SoundIndexBuilder>,
    tracker: Arc<VoicePresenceTracker>,
    config: DispatcherConfig,
}

impl EventDispatcher {
    pub fn new(
        platform: Arc<dyn ChatPlatformPort>,
        store: Arc<dyn GuildStorePort>,
        builder: Arc<SoundIndexBuilder>,
        tracker: Arc<VoicePresenceTracker>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            platform,
            store,
            builder,
            tracker,
            config,
        }
    }

    pub async fn dispatch(&self, event: PlatformEvent) -> Result<(), ApplicationError> {
        match event {
            PlatformEvent::SessionReady {
                bot_user_id,
                guild_ids,
            } => {
                self.on_ready(bot_user_id, guild_ids).await;
                Ok(())
            }
            PlatformEvent::MessageCreated(message) => self.on_message(message).await,
            PlatformEvent::VoiceStateChanged(change) => {
                self.tracker.handle(change).await?;
                Ok(())
            }
        }
    }

    async fn on_ready(&self, bot_user_id: UserId, guild_ids: Vec<GuildId>) {
        tracing::info!(
            bot_user_id = %bot_user_id,
            guilds = guild_ids.len(),
            "Session ready"
        );
        self.tracker.set_bot_user(bot_user_id);

        for guild_id in guild_ids {
            match self.setup_guild(guild_id).await {
                Ok(true) => {
                    if let Err(e) = self.builder.rebuild(guild_id).await {
                        tracing::error!(guild_id = %guild_id, error = %e, "Initial rebuild failed");
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(guild_id = %guild_id, error = %e, "Failed to set up guild");
                }
            }
        }
    }

    /// 按名称查找必需频道；缺少音效频道的 guild 跳过
    async fn setup_guild(&self, guild_id: GuildId) -> Result<bool, ApplicationError> {
        let channels = self.platform.list_channels(guild_id).await?;
        let find = |name: &str| {
            channels
                .iter()
                .find(|c| c.kind == ChannelKind::Text && c.name == name)
                .map(|c| c.id)
        };

        let Some(sounds_channel) = find(self.config.sounds_channel.as_str()) else {
            tracing::error!(
                guild_id = %guild_id,
                channel = %self.config.sounds_channel,
                "Sounds channel missing, guild skipped"
            );
            return Ok(false);
        };
        let commands_channel = find(self.config.commands_channel.as_str());
        if commands_channel.is_none() {
            tracing::warn!(
                guild_id = %guild_id,
                channel = %self.config.commands_channel,
                "Commands channel missing"
            );
        }

        self.store.register(GuildSetup {
            guild_id,
            sounds_channel,
            commands_channel,
        });
        Ok(true)
    }

    async fn on_message(&self, message: ChatMessage) -> Result<(), ApplicationError> {
        let Some(guild_id) = message.guild_id else {
            return Ok(());
        };
        if message.author_is_bot || !self.store.contains(guild_id) {
            return Ok(());
        }
        let channels = self.store.channels(guild_id)?;
        if message.channel_id != channels.sounds_channel {
            return Ok(());
        }

        if message.attachments.is_empty() {
            return self.enforce_files_only(message).await;
        }

        let Some(parsed) = parse_sound_message(&message, self.builder.media_extension()) else {
            tracing::debug!(message_id = %message.id, "Ignoring non-sound attachment");
            return Ok(());
        };
        for issue in &parsed.issues {
            if let IndexIssue::MalformedTag { error, .. } = issue {
                tracing::warn!(message_id = %message.id, error = %error, "Skipping malformed tag");
            }
        }

        self.store.upsert_sound(guild_id, &parsed.name, parsed.sound.clone())?;
        for user_id in parsed.entrance_users {
            self.store.bind_entrance(guild_id, user_id, parsed.sound.clone())?;
        }

        tracing::info!(
            guild_id = %guild_id,
            sound = %parsed.name,
            message_id = %message.id,
            "Sound added"
        );
        Ok(())
    }

    /// 回复提示，稍后删除提示与原消息
    async fn enforce_files_only(&self, message: ChatMessage) -> Result<(), ApplicationError> {
        let notice = self
            .platform
            .reply(message.channel_id, message.id, FILES_ONLY_NOTICE)
            .await?;

        let platform = Arc::clone(&self.platform);
        let delay = self.config.hygiene_delete_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for id in [notice.id, message.id] {
                if let Err(e) = platform.delete_message(message.channel_id, id).await {
                    tracing::warn!(message_id = %id, error = %e, "Failed to delete message");
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::VoiceStateChange;
    use crate::domain::sound::Sound;
    use crate::domain::{Attachment, ChannelId, MessageId};
    use crate::infrastructure::adapters::fake::{FakeEncoder, FakePlatform, FakeVoiceGateway};
    use crate::infrastructure::memory::InMemoryGuildStore;
    use crate::infrastructure::playback::{PlaybackController, PlaybackControllerConfig};
    use crate::infrastructure::worker::IndexBuilderConfig;

    const GUILD: GuildId = GuildId::new(1);
    const SOUNDS: ChannelId = ChannelId::new(2);
    const LOBBY: ChannelId = ChannelId::new(10);
    const BOT: UserId = UserId::new(900);
    const ALICE: UserId = UserId::new(100);

    struct Harness {
        platform: Arc<FakePlatform>,
        store: Arc<InMemoryGuildStore>,
        voice: Arc<FakeVoiceGateway>,
        dispatcher: EventDispatcher,
    }

    fn harness() -> Harness {
        let platform = Arc::new(FakePlatform::new(BOT));
        platform.add_channel(GUILD, SOUNDS, "sounds", ChannelKind::Text);
        platform.add_channel(GUILD, LOBBY, "Lobby", ChannelKind::Voice);

        let store = InMemoryGuildStore::new().arc();
        let voice = Arc::new(FakeVoiceGateway::new());
        let controller = Arc::new(PlaybackController::new(
            store.clone(),
            voice.clone(),
            Arc::new(FakeEncoder::new(2)),
            PlaybackControllerConfig::default(),
        ));
        let tracker = Arc::new(VoicePresenceTracker::new(
            platform.clone(),
            store.clone(),
            voice.clone(),
            controller,
            Duration::from_secs(1),
        ));
        let builder = Arc::new(SoundIndexBuilder::new(
            platform.clone(),
            store.clone(),
            IndexBuilderConfig::default(),
        ));
        let dispatcher = EventDispatcher::new(
            platform.clone(),
            store.clone(),
            builder,
            tracker,
            DispatcherConfig::default(),
        );
        Harness {
            platform,
            store,
            voice,
            dispatcher,
        }
    }

    fn user_message(id: u64, content: &str, attachments: Vec<Attachment>) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(id),
            channel_id: SOUNDS,
            guild_id: Some(GUILD),
            author_id: ALICE,
            author_is_bot: false,
            content: content.to_string(),
            attachments,
        }
    }

    async fn ready(h: &Harness) {
        h.dispatcher
            .dispatch(PlatformEvent::SessionReady {
                bot_user_id: BOT,
                guild_ids: vec![GUILD],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_session_ready_registers_and_rebuilds() {
        let h = harness();
        h.platform
            .add_sound_message(SOUNDS, MessageId::new(5), ALICE, "horn.mp3", "");
        ready(&h).await;

        assert_eq!(h.store.channels(GUILD).unwrap().sounds_channel, SOUNDS);
        assert_eq!(h.store.list_sounds(GUILD).unwrap(), vec!["horn"]);
    }

    #[tokio::test]
    async fn test_guild_without_sounds_channel_is_skipped() {
        let h = harness();
        let other = GuildId::new(2);
        h.dispatcher
            .dispatch(PlatformEvent::SessionReady {
                bot_user_id: BOT,
                guild_ids: vec![other, GUILD],
            })
            .await
            .unwrap();
        assert!(!h.store.contains(other));
        assert!(h.store.contains(GUILD));
    }

    #[tokio::test]
    async fn test_live_upload_is_indexed() {
        let h = harness();
        ready(&h).await;

        let attachment = Attachment {
            filename: "air.mp3".to_string(),
            url: "https://cdn.fake/air.mp3".to_string(),
        };
        h.dispatcher
            .dispatch(PlatformEvent::MessageCreated(user_message(7, "e:100;", vec![attachment])))
            .await
            .unwrap();

        assert!(h.store.find_sound(GUILD, "air").unwrap().is_some());
        assert_eq!(
            h.store.entrance(GUILD, ALICE).unwrap(),
            Some(Sound::new(MessageId::new(7), "https://cdn.fake/air.mp3"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_in_sounds_channel_is_cleaned_up() {
        let h = harness();
        ready(&h).await;
        let message = user_message(7, "hello", vec![]);
        h.platform.add_message(message.clone());

        h.dispatcher
            .dispatch(PlatformEvent::MessageCreated(message))
            .await
            .unwrap();
        assert_eq!(h.platform.replies(), vec![(MessageId::new(7), FILES_ONLY_NOTICE.to_string())]);
        assert!(h.platform.deleted().is_empty());

        tokio::time::sleep(Duration::from_secs(4)).await;
        let deleted = h.platform.deleted();
        assert_eq!(deleted.len(), 2);
        assert!(deleted.contains(&MessageId::new(7)));
    }

    #[tokio::test]
    async fn test_voice_event_reaches_tracker() {
        let h = harness();
        ready(&h).await;
        h.dispatcher
            .dispatch(PlatformEvent::VoiceStateChanged(VoiceStateChange {
                guild_id: GUILD,
                user_id: ALICE,
                is_bot: false,
                from: None,
                to: Some(LOBBY),
            }))
            .await
            .unwrap();
        assert_eq!(h.store.user_channel(GUILD, ALICE).unwrap(), Some(LOBBY));
        assert_eq!(h.voice.join_count(), 0);
    }
}
