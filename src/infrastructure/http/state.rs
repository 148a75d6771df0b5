//! Application State
//!
//! 包含所有 Command/Query Handlers 与中继接入所需的共享组件

use std::sync::Arc;

use crate::application::{
    // Command handlers
    AdjustVolumeHandler, ConnectHandler, PlaySoundHandler, RebuildHandler, RenameSoundHandler, SetEntranceHandler,
    SkipSoundHandler, SoundMessageEditor, StopSoundHandler,
    // Query handlers
    FindSoundHandler, GetPlaybackStateHandler, GetVoiceChannelsHandler, ListSoundsHandler,
    // Ports
    ChatPlatformPort, GuildStorePort, VoiceGatewayPort,
};
use crate::infrastructure::adapters::{GatewayCache, RelayVoiceGateway};
use crate::infrastructure::events::EventDispatcher;
use crate::infrastructure::playback::PlaybackController;
use crate::infrastructure::worker::SoundIndexBuilder;

/// 应用状态
pub struct AppState {
    // ========== Shared ==========
    pub store: Arc<dyn GuildStorePort>,
    pub dispatcher: Arc<EventDispatcher>,
    pub gateway: Arc<GatewayCache>,
    pub voice_relay: Arc<RelayVoiceGateway>,

    // ========== Command Handlers ==========
    pub set_entrance_handler: SetEntranceHandler,
    pub adjust_volume_handler: AdjustVolumeHandler,
    pub rename_sound_handler: RenameSoundHandler,
    pub rebuild_handler: RebuildHandler,
    pub play_handler: Arc<PlaySoundHandler>,
    pub skip_handler: SkipSoundHandler,
    pub stop_handler: StopSoundHandler,
    pub connect_handler: ConnectHandler,

    // ========== Query Handlers ==========
    pub find_sound_handler: FindSoundHandler,
    pub list_sounds_handler: ListSoundsHandler,
    pub voice_channels_handler: GetVoiceChannelsHandler,
    pub playback_state_handler: GetPlaybackStateHandler,
}

impl AppState {
    /// 创建应用状态
    ///
    /// `voice` 是播放使用的语音端口；`voice_relay` 只负责 `/ws/voice` 接入，
    /// 生产环境二者是同一个实例
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn ChatPlatformPort>,
        store: Arc<dyn GuildStorePort>,
        voice: Arc<dyn VoiceGatewayPort>,
        controller: Arc<PlaybackController>,
        builder: Arc<SoundIndexBuilder>,
        dispatcher: Arc<EventDispatcher>,
        gateway: Arc<GatewayCache>,
        voice_relay: Arc<RelayVoiceGateway>,
    ) -> Self {
        let editor = Arc::new(SoundMessageEditor::new(
            platform.clone(),
            store.clone(),
            builder.media_extension(),
        ));
        let play_handler = Arc::new(PlaySoundHandler::new(
            store.clone(),
            voice.clone(),
            controller.clone(),
        ));

        Self {
            // Shared
            store: store.clone(),
            dispatcher,
            gateway,
            voice_relay,

            // Command handlers
            set_entrance_handler: SetEntranceHandler::new(store.clone(), editor.clone()),
            adjust_volume_handler: AdjustVolumeHandler::new(store.clone(), editor.clone()),
            rename_sound_handler: RenameSoundHandler::new(store.clone(), editor),
            rebuild_handler: RebuildHandler::new(builder),
            skip_handler: SkipSoundHandler::new(play_handler.clone(), controller.clone()),
            stop_handler: StopSoundHandler::new(controller.clone()),
            connect_handler: ConnectHandler::new(store.clone(), controller.clone()),
            play_handler,

            // Query handlers
            find_sound_handler: FindSoundHandler::new(store.clone()),
            list_sounds_handler: ListSoundsHandler::new(store.clone()),
            voice_channels_handler: GetVoiceChannelsHandler::new(store.clone()),
            playback_state_handler: GetPlaybackStateHandler::new(store, controller),
        }
    }
}
