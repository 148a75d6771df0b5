//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod events;
pub mod http;
pub mod memory;
pub mod playback;
pub mod presence;
pub mod worker;

pub use events::EventDispatcher;
pub use memory::InMemoryGuildStore;
pub use playback::PlaybackController;
pub use presence::VoicePresenceTracker;
pub use worker::{RebuildWorker, SoundIndexBuilder};
