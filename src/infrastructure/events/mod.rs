//! Events Layer - 入站事件处理
//!
//! 把平台事件分发给目录构建器与语音在线状态追踪器

mod dispatcher;

pub use dispatcher::{DispatcherConfig, EventDispatcher, FILES_ONLY_NOTICE};
