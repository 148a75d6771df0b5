//! Presence Context - 语音在线状态
//!
//! 职责:
//! - 维护每个语音频道的成员
//! - 判断一次状态迁移是否应触发入场音

mod membership;

pub use membership::{GuildVoiceMembership, TransitionKind, VoiceChannelMembership, VoiceTransition};
