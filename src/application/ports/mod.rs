//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_encoder;
mod chat_platform;
mod guild_store;
mod voice_gateway;

pub use audio_encoder::{AudioEncoderPort, EncodeError, EncodeParams, FrameSource};
pub use chat_platform::{
    ChannelInfo, ChannelKind, ChatPlatformPort, FileUpload, PlatformError, PlatformEvent,
    VoiceOccupant, VoiceStateChange,
};
pub use guild_store::{GuildChannels, GuildSetup, GuildStorePort, PlaybackHandle, StoreError};
pub use voice_gateway::{VoiceConnectionPort, VoiceError, VoiceGatewayPort};
