//! Command Handlers 实现
//!
//! 所有 CommandHandler 的具体实现

mod playback_handlers;
mod sound_handlers;
mod sound_message;

pub use playback_handlers::*;
pub use sound_handlers::*;
pub use sound_message::SoundMessageEditor;
