//! Voice Gateway Port - 语音连接抽象

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{ChannelId, GuildId};

/// 语音连接错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VoiceError {
    #[error("Voice transport unavailable: {0}")]
    Unavailable(String),

    #[error("Voice connection not ready")]
    NotReady,

    #[error("Voice connection closed")]
    Closed,

    #[error("Failed to send frame: {0}")]
    SendFailed(String),
}

/// 单个 guild 的语音连接
#[async_trait]
pub trait VoiceConnectionPort: Send + Sync {
    fn guild_id(&self) -> GuildId;

    fn channel_id(&self) -> ChannelId;

    fn is_ready(&self) -> bool;

    async fn set_speaking(&self, speaking: bool) -> Result<(), VoiceError>;

    /// 发送一帧 opus 数据（20ms）
    async fn send_frame(&self, frame: Vec<u8>) -> Result<(), VoiceError>;
}

/// Voice Gateway Port
#[async_trait]
pub trait VoiceGatewayPort: Send + Sync {
    /// 加入（或切换到）语音频道，返回的连接可能尚未就绪
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnectionPort>, VoiceError>;

    /// 当前连接
    fn connection(&self, guild_id: GuildId) -> Option<Arc<dyn VoiceConnectionPort>>;

    async fn leave(&self, guild_id: GuildId) -> Result<(), VoiceError>;

    /// 丢弃本地连接记录（机器人已被平台断开时使用）
    fn forget(&self, guild_id: GuildId);
}
