//! Sound Context - Entities

use serde::{Deserialize, Serialize};

use super::Volume;
use crate::domain::ids::{MessageId, UserId};
use crate::domain::message::ChatMessage;
use crate::domain::tags::{self, TagError, TagKind};

/// 音效记录
///
/// `message_id` 指向音效频道中承载该音频附件的消息，
/// 该消息正文中的标签是音量/入场音的唯一持久化位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    pub message_id: MessageId,
    pub url: String,
    #[serde(default)]
    pub volume: Volume,
}

impl Sound {
    pub fn new(message_id: MessageId, url: impl Into<String>) -> Self {
        Self {
            message_id,
            url: url.into(),
            volume: Volume::unspecified(),
        }
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volume = volume;
        self
    }
}

/// 索引过程中发现的问题（记录日志后跳过，不中断重建）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexIssue {
    MalformedTag {
        message_id: MessageId,
        error: TagError,
    },
    InvalidTagValue {
        message_id: MessageId,
        kind: String,
        value: String,
    },
    /// 同一用户在多条消息上有入场音标签
    DuplicateEntrance {
        user_id: UserId,
        kept: MessageId,
        dropped: MessageId,
    },
}

/// 从单条消息解析出的音效
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSound {
    pub name: String,
    pub sound: Sound,
    pub entrance_users: Vec<UserId>,
    pub issues: Vec<IndexIssue>,
}

/// 解析音效消息
///
/// 仅接受恰好一个附件且扩展名匹配的消息；正文标签宽松解码
pub fn parse_sound_message(message: &ChatMessage, accepted_extension: &str) -> Option<ParsedSound> {
    let attachment = message.single_attachment()?;
    let name = super::clip_name(&attachment.filename, accepted_extension)?;

    let mut sound = Sound::new(message.id, attachment.url.clone());
    let mut entrance_users = Vec::new();
    let mut issues = Vec::new();

    let (decoded, errors) = tags::decode_lenient(&message.content);
    issues.extend(errors.into_iter().map(|error| IndexIssue::MalformedTag {
        message_id: message.id,
        error,
    }));

    for tag in decoded {
        match tag.kind() {
            TagKind::Entrance => match tag.value().parse::<UserId>() {
                Ok(user_id) if !entrance_users.contains(&user_id) => entrance_users.push(user_id),
                Ok(_) => {}
                Err(_) => issues.push(IndexIssue::InvalidTagValue {
                    message_id: message.id,
                    kind: "e".to_string(),
                    value: tag.value().to_string(),
                }),
            },
            TagKind::Volume => match tag.value().parse::<Volume>() {
                Ok(volume) => sound.volume = volume,
                Err(_) => issues.push(IndexIssue::InvalidTagValue {
                    message_id: message.id,
                    kind: "v".to_string(),
                    value: tag.value().to_string(),
                }),
            },
            TagKind::Other(_) => {}
        }
    }

    Some(ParsedSound {
        name,
        sound,
        entrance_users,
        issues,
    })
}
