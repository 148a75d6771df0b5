//! Presence Layer - 语音在线状态追踪

mod tracker;

pub use tracker::VoicePresenceTracker;
