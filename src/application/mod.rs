//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（ChatPlatform、VoiceGateway、AudioEncoder、GuildStore）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    // Sound commands
    AdjustVolumeCommand,
    AdjustVolumeResponse,
    RebuildCommand,
    RenameSoundCommand,
    RenameSoundResponse,
    SetEntranceCommand,
    SetEntranceResponse,
    // Playback commands
    ConnectCommand,
    ConnectResponse,
    PlaySoundCommand,
    PlaySoundResponse,
    SkipSoundCommand,
    SkipSoundResponse,
    StopSoundCommand,
    StopSoundResponse,
    // Handlers
    handlers::{
        AdjustVolumeHandler, ConnectHandler, PlaySoundHandler, RebuildHandler, RenameSoundHandler,
        SetEntranceHandler, SkipSoundHandler, SoundMessageEditor, StopSoundHandler,
    },
};

pub use error::ApplicationError;

pub use ports::{
    // Audio encoder
    AudioEncoderPort,
    EncodeError,
    EncodeParams,
    FrameSource,
    // Chat platform
    ChannelInfo,
    ChannelKind,
    ChatPlatformPort,
    FileUpload,
    PlatformError,
    PlatformEvent,
    VoiceOccupant,
    VoiceStateChange,
    // Guild store
    GuildChannels,
    GuildSetup,
    GuildStorePort,
    PlaybackHandle,
    StoreError,
    // Voice gateway
    VoiceConnectionPort,
    VoiceError,
    VoiceGatewayPort,
};

pub use queries::{
    FindSound,
    GetPlaybackState,
    GetVoiceChannels,
    ListSounds,
    // Handlers
    handlers::{
        message_link, FindSoundHandler, GetPlaybackStateHandler, GetVoiceChannelsHandler,
        ListSoundsHandler, SoundResponse,
    },
};
