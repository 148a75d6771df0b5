//! Playback Controller - 每个 guild 串行化的音频投递

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    AudioEncoderPort, EncodeParams, GuildStorePort, PlaybackHandle, VoiceConnectionPort,
    VoiceGatewayPort,
};
use crate::domain::sound::Sound;
use crate::domain::{ChannelId, GuildId};

/// Controller 配置
#[derive(Debug, Clone)]
pub struct PlaybackControllerConfig {
    pub frame_duration: Duration,
    /// 取消后静默等待的时间，避免截断爆音
    pub stop_settle: Duration,
    pub voice_join_timeout: Duration,
    pub voice_poll_interval: Duration,
    pub bitrate: i32,
}

impl Default for PlaybackControllerConfig {
    fn default() -> Self {
        Self {
            frame_duration: Duration::from_millis(20),
            stop_settle: Duration::from_millis(100),
            voice_join_timeout: Duration::from_secs(10),
            voice_poll_interval: Duration::from_millis(50),
            bitrate: 32000,
        }
    }
}

/// 一次播放请求（音效已解析）
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub name: String,
    pub sound: Sound,
}

/// 播放结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed { frames: usize },
    Cancelled { frames: usize },
}

/// guild 的播放状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Playing {
        sound: String,
        channel_id: ChannelId,
        started_at: DateTime<Utc>,
    },
    Stopping {
        sound: String,
    },
}

/// 播放控制器
///
/// 状态: Idle → Playing → (Stopping) → Idle。
/// 两把锁：store 内的状态锁（同步、短）与此处的播放锁（异步、覆盖整次播放）。
pub struct PlaybackController {
    store: Arc<dyn GuildStorePort>,
    voice: Arc<dyn VoiceGatewayPort>,
    encoder: Arc<dyn AudioEncoderPort>,
    config: PlaybackControllerConfig,
    locks: DashMap<GuildId, Arc<Mutex<()>>>,
    states: DashMap<GuildId, PlaybackState>,
}

/// 退出时清理已发布的句柄与状态
struct PublishedHandle<'a> {
    controller: &'a PlaybackController,
    guild_id: GuildId,
    id: Uuid,
}

impl Drop for PublishedHandle<'_> {
    fn drop(&mut self) {
        let _ = self.controller.store.clear_playback(self.guild_id, self.id);
        self.controller.states.insert(self.guild_id, PlaybackState::Idle);
    }
}

impl PlaybackController {
    pub fn new(
        store: Arc<dyn GuildStorePort>,
        voice: Arc<dyn VoiceGatewayPort>,
        encoder: Arc<dyn AudioEncoderPort>,
        config: PlaybackControllerConfig,
    ) -> Self {
        Self {
            store,
            voice,
            encoder,
            config,
            locks: DashMap::new(),
            states: DashMap::new(),
        }
    }

    fn playback_lock(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.locks.entry(guild_id).or_default().value().clone()
    }

    /// 播放一个音效，直到结束或被取消
    ///
    /// 同一 guild 的第二个请求会在播放锁上等待
    pub async fn play(&self, request: PlayRequest) -> Result<PlaybackOutcome, ApplicationError> {
        let lock = self.playback_lock(request.guild_id);
        let _guard = lock.lock().await;

        let handle = PlaybackHandle::new(&request.name, request.channel_id);
        self.store.set_playback(request.guild_id, handle.clone())?;
        let _published = PublishedHandle {
            controller: self,
            guild_id: request.guild_id,
            id: handle.id,
        };

        self.states.insert(
            request.guild_id,
            PlaybackState::Playing {
                sound: request.name.clone(),
                channel_id: request.channel_id,
                started_at: handle.started_at,
            },
        );

        let result = self.deliver(&request, &handle.token).await;
        match &result {
            Ok(outcome) => tracing::info!(
                guild_id = %request.guild_id,
                sound = %request.name,
                outcome = ?outcome,
                "Playback finished"
            ),
            Err(e) => tracing::warn!(
                guild_id = %request.guild_id,
                sound = %request.name,
                error = %e,
                "Playback failed"
            ),
        }
        result
    }

    /// 在独立任务上播放，错误只记录日志
    pub fn spawn_play(self: &Arc<Self>, request: PlayRequest) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let _ = controller.play(request).await;
        })
    }

    /// 取消当前播放；没有正在播放的音效时返回 false
    pub fn stop(&self, guild_id: GuildId) -> Result<bool, ApplicationError> {
        match self.store.playback(guild_id)? {
            Some(handle) => {
                handle.token.cancel();
                tracing::debug!(guild_id = %guild_id, sound = %handle.sound_name, "Stop signalled");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 只加入语音频道，不播放
    ///
    /// 已在该频道且就绪时直接复用；不等待播放锁
    pub async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), ApplicationError> {
        self.ensure_connection(guild_id, channel_id).await?;
        tracing::info!(guild_id = %guild_id, channel_id = %channel_id, "Voice connected");
        Ok(())
    }

    pub fn state(&self, guild_id: GuildId) -> PlaybackState {
        self.states
            .get(&guild_id)
            .map(|s| s.value().clone())
            .unwrap_or(PlaybackState::Idle)
    }

    async fn deliver(
        &self,
        request: &PlayRequest,
        token: &CancellationToken,
    ) -> Result<PlaybackOutcome, ApplicationError> {
        let connection = self.ensure_connection(request.guild_id, request.channel_id).await?;

        let params = EncodeParams::for_sound(
            &request.sound,
            self.config.bitrate,
            self.config.frame_duration.as_millis() as u32,
        );
        let mut source = self.encoder.open(&request.sound.url, params).await?;

        if let Err(e) = connection.set_speaking(true).await {
            return Err(ApplicationError::ExternalServiceError(e.to_string()));
        }

        let mut ticker = tokio::time::interval(self.config.frame_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frames = 0usize;

        let result = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break Ok(PlaybackOutcome::Cancelled { frames }),
                _ = ticker.tick() => {}
            }

            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(PlaybackOutcome::Completed { frames }),
                Err(e) => break Err(ApplicationError::from(e)),
            };
            if let Err(e) = connection.send_frame(frame).await {
                break Err(ApplicationError::ExternalServiceError(e.to_string()));
            }
            frames += 1;
        };

        if let Ok(PlaybackOutcome::Cancelled { .. }) = result {
            self.states.insert(
                request.guild_id,
                PlaybackState::Stopping {
                    sound: request.name.clone(),
                },
            );
            tokio::time::sleep(self.config.stop_settle).await;
        }

        if let Err(e) = connection.set_speaking(false).await {
            tracing::debug!(guild_id = %request.guild_id, error = %e, "Failed to clear speaking flag");
        }
        result
    }

    /// 复用已就绪的连接，否则加入并轮询直到就绪或超时
    async fn ensure_connection(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnectionPort>, ApplicationError> {
        if let Some(connection) = self.voice.connection(guild_id) {
            if connection.is_ready() && connection.channel_id() == channel_id {
                return Ok(connection);
            }
        }

        let connection = self
            .voice
            .join(guild_id, channel_id)
            .await
            .map_err(|e| ApplicationError::VoiceJoinFailed(e.to_string()))?;

        let deadline = Instant::now() + self.config.voice_join_timeout;
        while !connection.is_ready() {
            if Instant::now() >= deadline {
                return Err(ApplicationError::VoiceJoinFailed(format!(
                    "voice connection to {} not ready after {:?}",
                    channel_id, self.config.voice_join_timeout
                )));
            }
            tokio::time::sleep(self.config.voice_poll_interval).await;
        }

        tracing::debug!(guild_id = %guild_id, channel_id = %channel_id, "Voice connection ready");
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::GuildSetup;
    use crate::domain::MessageId;
    use crate::infrastructure::adapters::fake::{FakeEncoder, FakeVoiceGateway, VoiceLogEntry};
    use crate::infrastructure::memory::InMemoryGuildStore;

    const GUILD: GuildId = GuildId::new(1);
    const VOICE: ChannelId = ChannelId::new(3);

    struct Harness {
        store: Arc<InMemoryGuildStore>,
        voice: Arc<FakeVoiceGateway>,
        encoder: Arc<FakeEncoder>,
        controller: Arc<PlaybackController>,
    }

    fn harness(default_frames: usize) -> Harness {
        let store = InMemoryGuildStore::new().arc();
        store.register(GuildSetup {
            guild_id: GUILD,
            sounds_channel: ChannelId::new(2),
            commands_channel: None,
        });
        let voice = Arc::new(FakeVoiceGateway::new());
        let encoder = Arc::new(FakeEncoder::new(default_frames));
        let controller = Arc::new(PlaybackController::new(
            store.clone(),
            voice.clone(),
            encoder.clone(),
            PlaybackControllerConfig::default(),
        ));
        Harness {
            store,
            voice,
            encoder,
            controller,
        }
    }

    fn request(name: &str, id: u64) -> PlayRequest {
        PlayRequest {
            guild_id: GUILD,
            channel_id: VOICE,
            name: name.to_string(),
            sound: Sound::new(MessageId::new(id), format!("{}.mp3", name)),
        }
    }

    /// 帧所属的音效名称序列（相邻去重）
    fn frame_runs(frames: &[Vec<u8>]) -> Vec<String> {
        let mut runs: Vec<String> = Vec::new();
        for frame in frames {
            let text = String::from_utf8_lossy(frame);
            let name = text.split('.').next().unwrap_or_default().to_string();
            if runs.last() != Some(&name) {
                runs.push(name);
            }
        }
        runs
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_to_completion() {
        let h = harness(5);
        let outcome = h.controller.play(request("horn", 1)).await.unwrap();

        assert_eq!(outcome, PlaybackOutcome::Completed { frames: 5 });
        assert_eq!(h.voice.frames().len(), 5);
        assert_eq!(h.controller.state(GUILD), PlaybackState::Idle);
        assert!(h.store.playback(GUILD).unwrap().is_none());

        let log = h.voice.log();
        assert_eq!(log.first(), Some(&VoiceLogEntry::Speaking(GUILD, true)));
        assert_eq!(log.last(), Some(&VoiceLogEntry::Speaking(GUILD, false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unspecified_volume_is_mapped_at_encoder() {
        let h = harness(1);
        h.controller.play(request("horn", 1)).await.unwrap();
        let params = h.encoder.opened()[0].1;
        assert_eq!(params.volume, 256);
        assert_eq!(params.gain, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_playback_per_guild() {
        let h = harness(10);
        let first = h.controller.spawn_play(request("siren", 1));
        let second = h.controller.spawn_play(request("horn", 2));
        first.await.unwrap();
        second.await.unwrap();

        let frames = h.voice.frames();
        assert_eq!(frames.len(), 20);
        // siren 播完后 horn 才开始，帧不交错
        assert_eq!(frame_runs(&frames), vec!["siren", "horn"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_and_settles() {
        let h = harness(1000);
        let task = h.controller.spawn_play(request("siren", 1));
        tokio::time::sleep(Duration::from_millis(105)).await;

        assert!(matches!(h.controller.state(GUILD), PlaybackState::Playing { .. }));
        assert!(h.controller.stop(GUILD).unwrap());
        task.await.unwrap();

        let frames = h.voice.frames().len();
        assert!(frames > 0 && frames < 1000);
        assert_eq!(h.controller.state(GUILD), PlaybackState::Idle);
        assert_eq!(h.voice.log().last(), Some(&VoiceLogEntry::Speaking(GUILD, false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_stop_signal_does_not_affect_next_playback() {
        let h = harness(5);
        h.controller.play(request("siren", 1)).await.unwrap();

        // 播放结束后才到达的停止信号
        assert!(!h.controller.stop(GUILD).unwrap());

        let outcome = h.controller.play(request("horn", 2)).await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed { frames: 5 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_token_cancel_is_ignored() {
        let h = harness(5);
        let task = h.controller.spawn_play(request("siren", 1));
        tokio::time::sleep(Duration::from_millis(30)).await;
        let old = h.store.playback(GUILD).unwrap().unwrap();
        task.await.unwrap();

        old.token.cancel();
        let outcome = h.controller.play(request("horn", 2)).await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed { frames: 5 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_timeout() {
        let h = harness(5);
        h.voice.set_ready_on_join(false);
        let result = h.controller.play(request("horn", 1)).await;
        assert!(matches!(result, Err(ApplicationError::VoiceJoinFailed(_))));
        assert!(h.store.playback(GUILD).unwrap().is_none());
        assert_eq!(h.controller.state(GUILD), PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoding_failure_releases_lock() {
        let h = harness(3);
        h.encoder.fail_on("broken.mp3");
        let result = h.controller.play(request("broken", 1)).await;
        assert!(matches!(result, Err(ApplicationError::EncodingFailure(_))));

        let outcome = h.controller.play(request("horn", 2)).await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed { frames: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_reuses_ready_connection() {
        let h = harness(1);
        h.controller.play(request("horn", 1)).await.unwrap();
        h.controller.play(request("air", 2)).await.unwrap();
        assert_eq!(h.voice.join_count(), 1);
    }
}
