//! Chat Platform Port - 聊天平台 REST 能力抽象
//!
//! 消息历史、消息增删改、文件上传与语音在线状态查询，
//! 具体实现在 infrastructure/adapters/platform 层

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ChannelId, ChatMessage, GuildId, MessageId, UserId};

/// 平台调用错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Transient upstream failure: {0}")]
    Transient(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl PlatformError {
    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::RateLimited { .. } | PlatformError::Transient(_) | PlatformError::Network(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Other,
}

/// 频道信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
}

/// 语音频道中的一个在线用户
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceOccupant {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub is_bot: bool,
}

/// 待上传文件
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content: String,
    pub data: Vec<u8>,
}

/// 语音状态变化（平台原始事件）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceStateChange {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub is_bot: bool,
    pub from: Option<ChannelId>,
    pub to: Option<ChannelId>,
}

/// 入站事件
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// 会话建立，附带机器人自身 ID 与可见的 guild
    SessionReady {
        bot_user_id: UserId,
        guild_ids: Vec<GuildId>,
    },
    MessageCreated(ChatMessage),
    VoiceStateChanged(VoiceStateChange),
}

/// Chat Platform Port
#[async_trait]
pub trait ChatPlatformPort: Send + Sync {
    /// 机器人自身的用户 ID
    async fn current_user(&self) -> Result<UserId, PlatformError>;

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<ChannelInfo>, PlatformError>;

    /// 当前所有语音在线用户
    async fn list_voice_states(&self, guild_id: GuildId) -> Result<Vec<VoiceOccupant>, PlatformError>;

    /// 拉取一页历史消息，按新到旧排序；`before` 为空时从最新开始
    async fn fetch_messages_page(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PlatformError>;

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<ChatMessage, PlatformError>;

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<ChatMessage, PlatformError>;

    async fn reply(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<ChatMessage, PlatformError>;

    /// 修改消息正文（只能修改机器人自己发出的消息）
    async fn edit_message_content(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<ChatMessage, PlatformError>;

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), PlatformError>;

    async fn upload_file(&self, channel_id: ChannelId, file: FileUpload) -> Result<ChatMessage, PlatformError>;

    /// 下载附件原始字节
    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, PlatformError>;
}
