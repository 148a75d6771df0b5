//! Domain Layer - 领域层
//!
//! 包含三个限界上下文:
//! - Sound Context: 音效目录与入场音
//! - Tag Context: 消息内嵌标签语法
//! - Presence Context: 语音频道成员

pub mod ids;
pub mod message;
pub mod presence;
pub mod sound;
pub mod tags;

pub use ids::{ChannelId, GuildId, MessageId, UserId};
pub use message::{Attachment, ChatMessage};
