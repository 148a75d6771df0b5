//! Playback Command Handlers

use std::sync::Arc;

use crate::application::commands::playback_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{GuildStorePort, VoiceGatewayPort};
use crate::domain::{ChannelId, GuildId, UserId};
use crate::infrastructure::playback::{PlayRequest, PlaybackController};

/// 解析目标语音频道：显式频道 → 请求者所在频道 → 机器人当前连接
fn resolve_channel(
    store: &dyn GuildStorePort,
    voice: &dyn VoiceGatewayPort,
    guild_id: GuildId,
    user_id: Option<UserId>,
    channel_id: Option<ChannelId>,
) -> Result<ChannelId, ApplicationError> {
    if let Some(channel_id) = channel_id {
        return Ok(channel_id);
    }
    if let Some(user_id) = user_id {
        if let Some(channel_id) = store.user_channel(guild_id, user_id)? {
            return Ok(channel_id);
        }
    }
    voice
        .connection(guild_id)
        .map(|c| c.channel_id())
        .ok_or_else(|| ApplicationError::not_found("Voice channel", guild_id))
}

// ============================================================================
// PlaySound
// ============================================================================

/// PlaySound Handler - 解析音效与频道后在后台播放
pub struct PlaySoundHandler {
    store: Arc<dyn GuildStorePort>,
    voice: Arc<dyn VoiceGatewayPort>,
    controller: Arc<PlaybackController>,
}

impl PlaySoundHandler {
    pub fn new(
        store: Arc<dyn GuildStorePort>,
        voice: Arc<dyn VoiceGatewayPort>,
        controller: Arc<PlaybackController>,
    ) -> Self {
        Self {
            store,
            voice,
            controller,
        }
    }

    fn prepare(
        &self,
        guild_id: GuildId,
        name: &str,
        user_id: Option<UserId>,
        channel_id: Option<ChannelId>,
    ) -> Result<PlayRequest, ApplicationError> {
        let sound = self
            .store
            .find_sound(guild_id, name)?
            .ok_or_else(|| ApplicationError::not_found("Sound", name))?;
        let channel_id = resolve_channel(
            self.store.as_ref(),
            self.voice.as_ref(),
            guild_id,
            user_id,
            channel_id,
        )?;
        Ok(PlayRequest {
            guild_id,
            channel_id,
            name: name.to_string(),
            sound,
        })
    }

    pub async fn handle(&self, cmd: PlaySoundCommand) -> Result<PlaySoundResponse, ApplicationError> {
        let request = self.prepare(cmd.guild_id, &cmd.name, cmd.user_id, cmd.channel_id)?;
        let channel_id = request.channel_id;

        tracing::info!(
            guild_id = %cmd.guild_id,
            channel_id = %channel_id,
            sound = %cmd.name,
            "Play requested"
        );
        self.controller.spawn_play(request);

        Ok(PlaySoundResponse {
            name: cmd.name,
            channel_id,
        })
    }
}

// ============================================================================
// SkipSound
// ============================================================================

/// SkipSound Handler
///
/// 先解析下一个音效（不存在时不打断当前播放），再取消当前播放并排队
pub struct SkipSoundHandler {
    play: Arc<PlaySoundHandler>,
    controller: Arc<PlaybackController>,
}

impl SkipSoundHandler {
    pub fn new(play: Arc<PlaySoundHandler>, controller: Arc<PlaybackController>) -> Self {
        Self { play, controller }
    }

    pub async fn handle(&self, cmd: SkipSoundCommand) -> Result<SkipSoundResponse, ApplicationError> {
        let next = match &cmd.next {
            Some(name) => Some(self.play.prepare(cmd.guild_id, name, cmd.user_id, cmd.channel_id)?),
            None => None,
        };

        let skipped = self.controller.stop(cmd.guild_id)?;

        let next = next.map(|request| {
            let response = PlaySoundResponse {
                name: request.name.clone(),
                channel_id: request.channel_id,
            };
            self.controller.spawn_play(request);
            response
        });

        tracing::info!(
            guild_id = %cmd.guild_id,
            skipped = skipped,
            next = ?cmd.next,
            "Skip requested"
        );

        Ok(SkipSoundResponse { skipped, next })
    }
}

// ============================================================================
// StopSound
// ============================================================================

/// StopSound Handler
pub struct StopSoundHandler {
    controller: Arc<PlaybackController>,
}

impl StopSoundHandler {
    pub fn new(controller: Arc<PlaybackController>) -> Self {
        Self { controller }
    }

    pub async fn handle(&self, cmd: StopSoundCommand) -> Result<StopSoundResponse, ApplicationError> {
        let stopped = self.controller.stop(cmd.guild_id)?;
        tracing::info!(guild_id = %cmd.guild_id, stopped = stopped, "Stop requested");
        Ok(StopSoundResponse { stopped })
    }
}

// ============================================================================
// Connect
// ============================================================================

/// Connect Handler
///
/// 目标频道：显式频道 → 请求者所在频道；机器人当前连接不算目标
pub struct ConnectHandler {
    store: Arc<dyn GuildStorePort>,
    controller: Arc<PlaybackController>,
}

impl ConnectHandler {
    pub fn new(store: Arc<dyn GuildStorePort>, controller: Arc<PlaybackController>) -> Self {
        Self { store, controller }
    }

    pub async fn handle(&self, cmd: ConnectCommand) -> Result<ConnectResponse, ApplicationError> {
        let requested = match (cmd.channel_id, cmd.user_id) {
            (Some(channel_id), _) => Some(channel_id),
            (None, Some(user_id)) => self.store.user_channel(cmd.guild_id, user_id)?,
            (None, None) => None,
        };
        let channel_id =
            requested.ok_or_else(|| ApplicationError::not_found("Voice channel", cmd.guild_id))?;

        self.controller.connect(cmd.guild_id, channel_id).await?;
        Ok(ConnectResponse { channel_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::GuildSetup;
    use crate::domain::presence::VoiceTransition;
    use crate::domain::sound::Sound;
    use crate::domain::MessageId;
    use crate::infrastructure::adapters::fake::{FakeEncoder, FakeVoiceGateway, VoiceLogEntry};
    use crate::infrastructure::memory::InMemoryGuildStore;
    use crate::infrastructure::playback::{PlaybackControllerConfig, PlaybackState};
    use std::time::Duration;

    const GUILD: GuildId = GuildId::new(1);
    const VOICE: ChannelId = ChannelId::new(3);
    const ALICE: UserId = UserId::new(100);

    struct Harness {
        store: Arc<InMemoryGuildStore>,
        voice: Arc<FakeVoiceGateway>,
        encoder: Arc<FakeEncoder>,
        controller: Arc<PlaybackController>,
        play: Arc<PlaySoundHandler>,
    }

    fn harness() -> Harness {
        let store = InMemoryGuildStore::new().arc();
        store.register(GuildSetup {
            guild_id: GUILD,
            sounds_channel: ChannelId::new(2),
            commands_channel: None,
        });
        store
            .upsert_sound(GUILD, "siren", Sound::new(MessageId::new(1), "siren.mp3"))
            .unwrap();
        store
            .upsert_sound(GUILD, "horn", Sound::new(MessageId::new(2), "horn.mp3"))
            .unwrap();

        let voice = Arc::new(FakeVoiceGateway::new());
        let encoder = Arc::new(FakeEncoder::new(10));
        let controller = Arc::new(PlaybackController::new(
            store.clone(),
            voice.clone(),
            encoder.clone(),
            PlaybackControllerConfig::default(),
        ));
        let play = Arc::new(PlaySoundHandler::new(store.clone(), voice.clone(), controller.clone()));
        Harness {
            store,
            voice,
            encoder,
            controller,
            play,
        }
    }

    /// 等待直到 horn 播完
    async fn wait_for_horn(h: &Harness, frames: usize) {
        for _ in 0..1000 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let played = h.voice.frames().iter().filter(|f| f.starts_with(b"horn")).count();
            if played == frames && h.controller.state(GUILD) == PlaybackState::Idle {
                return;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_resolves_user_channel() {
        let h = harness();
        h.store
            .apply_transition(&VoiceTransition {
                guild_id: GUILD,
                user_id: ALICE,
                from: None,
                to: Some(VOICE),
            })
            .unwrap();

        let response = h
            .play
            .handle(PlaySoundCommand {
                guild_id: GUILD,
                name: "horn".to_string(),
                user_id: Some(ALICE),
                channel_id: None,
            })
            .await
            .unwrap();
        assert_eq!(response.channel_id, VOICE);
    }

    #[tokio::test]
    async fn test_play_without_target_channel() {
        let h = harness();
        let result = h
            .play
            .handle(PlaySoundCommand {
                guild_id: GUILD,
                name: "horn".to_string(),
                user_id: Some(ALICE),
                channel_id: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::NotFound {
                resource_type: "Voice channel",
                ..
            })
        ));

        let missing = h
            .play
            .handle(PlaySoundCommand {
                guild_id: GUILD,
                name: "nope".to_string(),
                user_id: None,
                channel_id: Some(VOICE),
            })
            .await;
        assert!(matches!(missing, Err(ApplicationError::NotFound { resource_type: "Sound", .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_to_next_never_overlaps() {
        let h = harness();
        h.encoder.set_frames("siren.mp3", 1000);
        h.encoder.set_frames("horn.mp3", 5);

        h.play
            .handle(PlaySoundCommand {
                guild_id: GUILD,
                name: "siren".to_string(),
                user_id: None,
                channel_id: Some(VOICE),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let skip = SkipSoundHandler::new(h.play.clone(), h.controller.clone());
        let response = skip
            .handle(SkipSoundCommand {
                guild_id: GUILD,
                next: Some("horn".to_string()),
                user_id: None,
                channel_id: Some(VOICE),
            })
            .await
            .unwrap();
        assert!(response.skipped);
        assert_eq!(response.next.unwrap().name, "horn");

        wait_for_horn(&h, 5).await;

        let log = h.voice.log();
        let first_horn = log
            .iter()
            .position(|e| matches!(e, VoiceLogEntry::Frame(_, f) if f.starts_with(b"horn")))
            .unwrap();
        let last_siren = log
            .iter()
            .rposition(|e| matches!(e, VoiceLogEntry::Frame(_, f) if f.starts_with(b"siren")))
            .unwrap();
        assert!(last_siren < first_horn);
        // siren 结束（speaking 关闭）后 horn 才开始
        assert!(log[last_siren..first_horn].contains(&VoiceLogEntry::Speaking(GUILD, false)));

        let horn_frames = h.voice.frames().iter().filter(|f| f.starts_with(b"horn")).count();
        assert_eq!(horn_frames, 5);
    }

    #[tokio::test]
    async fn test_skip_unknown_next_keeps_current() {
        let h = harness();
        let skip = SkipSoundHandler::new(h.play.clone(), h.controller.clone());
        let result = skip
            .handle(SkipSoundCommand {
                guild_id: GUILD,
                next: Some("nope".to_string()),
                user_id: None,
                channel_id: Some(VOICE),
            })
            .await;
        assert!(matches!(result, Err(ApplicationError::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_joins_requester_channel() {
        let h = harness();
        let connect = ConnectHandler::new(h.store.clone(), h.controller.clone());

        let result = connect
            .handle(ConnectCommand {
                guild_id: GUILD,
                user_id: Some(ALICE),
                channel_id: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::NotFound {
                resource_type: "Voice channel",
                ..
            })
        ));
        assert_eq!(h.voice.join_count(), 0);

        h.store
            .apply_transition(&VoiceTransition {
                guild_id: GUILD,
                user_id: ALICE,
                from: None,
                to: Some(VOICE),
            })
            .unwrap();
        let response = connect
            .handle(ConnectCommand {
                guild_id: GUILD,
                user_id: Some(ALICE),
                channel_id: None,
            })
            .await
            .unwrap();

        assert_eq!(response.channel_id, VOICE);
        assert_eq!(h.voice.join_count(), 1);
        assert!(h.voice.frames().is_empty());
        assert_eq!(h.controller.state(GUILD), PlaybackState::Idle);

        // 已在该频道时不重复加入
        connect
            .handle(ConnectCommand {
                guild_id: GUILD,
                user_id: Some(ALICE),
                channel_id: None,
            })
            .await
            .unwrap();
        assert_eq!(h.voice.join_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let h = harness();
        let stop = StopSoundHandler::new(h.controller.clone());
        let response = stop.handle(StopSoundCommand { guild_id: GUILD }).await.unwrap();
        assert!(!response.stopped);
    }
}
