//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::infrastructure::adapters::HttpPlatformClientConfig;
use crate::infrastructure::events::DispatcherConfig;
use crate::infrastructure::playback::PlaybackControllerConfig;
use crate::infrastructure::worker::IndexBuilderConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 聊天平台配置
    #[serde(default)]
    pub platform: PlatformConfig,

    /// 音效目录配置
    #[serde(default)]
    pub soundboard: SoundboardConfig,

    /// 播放配置
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 聊天平台配置
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// REST API 基础 URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// 机器人 token
    #[serde(default)]
    pub token: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_platform_timeout")]
    pub timeout_secs: u64,

    /// 瞬时失败的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 首次重试等待（毫秒），之后指数增长
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_platform_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token: String::new(),
            timeout_secs: default_platform_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
        }
    }
}

impl PlatformConfig {
    pub fn client_config(&self) -> HttpPlatformClientConfig {
        HttpPlatformClientConfig {
            api_base_url: self.api_base_url.clone(),
            token: self.token.clone(),
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            retry_base_delay_ms: self.retry_base_delay_ms,
        }
    }
}

/// 音效目录配置
#[derive(Debug, Clone, Deserialize)]
pub struct SoundboardConfig {
    /// 存放音效的文本频道名
    #[serde(default = "default_sounds_channel")]
    pub sounds_channel: String,

    /// 命令频道名（可缺省）
    #[serde(default = "default_commands_channel")]
    pub commands_channel: String,

    /// 接受的附件扩展名
    #[serde(default = "default_media_extension")]
    pub media_extension: String,

    /// 重建时每页消息数（1-100）
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// 定期重建间隔（秒），0 表示关闭
    #[serde(default = "default_rebuild_interval")]
    pub rebuild_interval_secs: u64,

    /// 音效频道非文件消息的删除延迟（秒）
    #[serde(default = "default_hygiene_delay")]
    pub hygiene_delete_delay_secs: u64,
}

fn default_sounds_channel() -> String {
    "sounds".to_string()
}

fn default_commands_channel() -> String {
    "bot-commands".to_string()
}

fn default_media_extension() -> String {
    "mp3".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_rebuild_interval() -> u64 {
    14400 // 4 小时
}

fn default_hygiene_delay() -> u64 {
    3
}

impl Default for SoundboardConfig {
    fn default() -> Self {
        Self {
            sounds_channel: default_sounds_channel(),
            commands_channel: default_commands_channel(),
            media_extension: default_media_extension(),
            page_size: default_page_size(),
            rebuild_interval_secs: default_rebuild_interval(),
            hygiene_delete_delay_secs: default_hygiene_delay(),
        }
    }
}

impl SoundboardConfig {
    pub fn index_config(&self) -> IndexBuilderConfig {
        IndexBuilderConfig {
            page_size: self.page_size,
            media_extension: self.media_extension.clone(),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            sounds_channel: self.sounds_channel.clone(),
            commands_channel: self.commands_channel.clone(),
            hygiene_delete_delay: Duration::from_secs(self.hygiene_delete_delay_secs),
        }
    }
}

/// 播放配置
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// 每帧时长（毫秒）
    #[serde(default = "default_frame_duration")]
    pub frame_duration_ms: u64,

    /// 取消后等待旧播放退出的时间（毫秒）
    #[serde(default = "default_stop_settle")]
    pub stop_settle_ms: u64,

    /// 等待语音连接就绪的上限（毫秒）
    #[serde(default = "default_join_timeout")]
    pub voice_join_timeout_ms: u64,

    /// 就绪轮询间隔（毫秒）
    #[serde(default = "default_poll_interval")]
    pub voice_poll_interval_ms: u64,

    /// 入场音在用户加入后的延迟（毫秒）
    #[serde(default = "default_entrance_delay")]
    pub entrance_delay_ms: u64,

    /// opus 比特率（bps）
    #[serde(default = "default_bitrate")]
    pub bitrate: i32,
}

fn default_frame_duration() -> u64 {
    20
}

fn default_stop_settle() -> u64 {
    100
}

fn default_join_timeout() -> u64 {
    10_000
}

fn default_poll_interval() -> u64 {
    50
}

fn default_entrance_delay() -> u64 {
    1000
}

fn default_bitrate() -> i32 {
    32000
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_duration_ms: default_frame_duration(),
            stop_settle_ms: default_stop_settle(),
            voice_join_timeout_ms: default_join_timeout(),
            voice_poll_interval_ms: default_poll_interval(),
            entrance_delay_ms: default_entrance_delay(),
            bitrate: default_bitrate(),
        }
    }
}

impl PlaybackConfig {
    pub fn controller_config(&self) -> PlaybackControllerConfig {
        PlaybackControllerConfig {
            frame_duration: Duration::from_millis(self.frame_duration_ms),
            stop_settle: Duration::from_millis(self.stop_settle_ms),
            voice_join_timeout: Duration::from_millis(self.voice_join_timeout_ms),
            voice_poll_interval: Duration::from_millis(self.voice_poll_interval_ms),
            bitrate: self.bitrate,
        }
    }

    pub fn entrance_delay(&self) -> Duration {
        Duration::from_millis(self.entrance_delay_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
