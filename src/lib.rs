//! clipdeck - 群聊平台音效板服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Tags: 消息正文中的标签编解码
//! - Sound: 音效、音量与目录快照
//! - Presence: 语音频道成员
//!
//! 应用层 (application/):
//! - Ports: 端口定义（ChatPlatform, VoiceGateway, AudioEncoder, GuildStore）
//! - Commands: CQRS 命令处理器
//! - Queries: CQRS 查询处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: 命令 API + 中继 WebSocket
//! - Memory: GuildStore 内存实现
//! - Playback: 每个 guild 至多一个播放的控制器
//! - Presence: 语音状态追踪与入场音
//! - Worker: 目录重建与定期重建
//! - Events: 平台事件分发
//! - Adapters: 平台 REST、网关缓存、语音中继、opus 编码器与测试用 fake

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
