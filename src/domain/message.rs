//! Chat Message - 平台消息的领域视图

use serde::{Deserialize, Serialize};

use super::ids::{ChannelId, GuildId, MessageId, UserId};

/// 消息附件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
    #[serde(default)]
    pub author_is_bot: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    /// 唯一附件（多附件或无附件时返回 None）
    pub fn single_attachment(&self) -> Option<&Attachment> {
        match self.attachments.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}
