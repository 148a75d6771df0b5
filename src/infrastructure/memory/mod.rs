//! Memory Layer - In-Memory State Management
//!
//! 实现 GuildStorePort，管理每个 guild 的音效目录、入场音、语音成员与播放句柄

mod guild_store;

pub use guild_store::InMemoryGuildStore;
