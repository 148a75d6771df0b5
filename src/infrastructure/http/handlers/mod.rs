//! HTTP Handlers

mod entrance;
mod ping;
mod playback;
mod sound;
mod voice;
mod websocket;

pub use entrance::*;
pub use ping::*;
pub use playback::*;
pub use sound::*;
pub use voice::*;
pub use websocket::*;
