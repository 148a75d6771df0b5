//! Fake Adapters - 各端口的内存实现
//!
//! 不依赖外部服务，供测试与本地演示使用

mod encoder;
mod platform;
mod voice;

pub use encoder::FakeEncoder;
pub use platform::FakePlatform;
pub use voice::{FakeVoiceConnection, FakeVoiceGateway, VoiceLogEntry};
