//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "CLIPDECK";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `CLIPDECK_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `CLIPDECK_SERVER__PORT=8080`
/// - `CLIPDECK_PLATFORM__TOKEN=...`
/// - `CLIPDECK_SOUNDBOARD__SOUNDS_CHANNEL=clips`
/// - `CLIPDECK_PLAYBACK__ENTRANCE_DELAY_MS=1500`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("platform.api_base_url", "https://discord.com/api/v10")?
        .set_default("platform.token", "")?
        .set_default("platform.timeout_secs", 30)?
        .set_default("platform.max_retries", 3)?
        .set_default("platform.retry_base_delay_ms", 500)?
        .set_default("soundboard.sounds_channel", "sounds")?
        .set_default("soundboard.commands_channel", "bot-commands")?
        .set_default("soundboard.media_extension", "mp3")?
        .set_default("soundboard.page_size", 100)?
        .set_default("soundboard.rebuild_interval_secs", 14400)?
        .set_default("soundboard.hygiene_delete_delay_secs", 3)?
        .set_default("playback.frame_duration_ms", 20)?
        .set_default("playback.stop_settle_ms", 100)?
        .set_default("playback.voice_join_timeout_ms", 10_000)?
        .set_default("playback.voice_poll_interval_ms", 50)?
        .set_default("playback.entrance_delay_ms", 1000)?
        .set_default("playback.bitrate", 32000)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.platform.api_base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Platform API base URL cannot be empty".to_string(),
        ));
    }

    if config.soundboard.sounds_channel.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Sounds channel name cannot be empty".to_string(),
        ));
    }

    // 平台单页上限 100
    if !(1..=100).contains(&config.soundboard.page_size) {
        return Err(ConfigError::ValidationError(format!(
            "Page size must be within 1..=100, got {}",
            config.soundboard.page_size
        )));
    }

    // opus 只支持这些帧长
    if ![10, 20, 40, 60].contains(&config.playback.frame_duration_ms) {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported frame duration: {}ms",
            config.playback.frame_duration_ms
        )));
    }

    if !(6_000..=510_000).contains(&config.playback.bitrate) {
        return Err(ConfigError::ValidationError(format!(
            "Bitrate out of range: {}",
            config.playback.bitrate
        )));
    }

    if config.playback.voice_poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Voice poll interval cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Platform API: {}", config.platform.api_base_url);
    tracing::info!("Platform Token: {}", redact(&config.platform.token));
    tracing::info!(
        "Platform Retries: {} (base delay {}ms)",
        config.platform.max_retries,
        config.platform.retry_base_delay_ms
    );
    tracing::info!(
        "Channels: sounds={} commands={}",
        config.soundboard.sounds_channel,
        config.soundboard.commands_channel
    );
    tracing::info!("Media Extension: {}", config.soundboard.media_extension);
    if config.soundboard.rebuild_interval_secs > 0 {
        tracing::info!("Rebuild Interval: {}s", config.soundboard.rebuild_interval_secs);
    } else {
        tracing::info!("Periodic Rebuild: disabled");
    }
    tracing::info!(
        "Playback: frame={}ms bitrate={} join_timeout={}ms",
        config.playback.frame_duration_ms,
        config.playback.bitrate,
        config.playback.voice_join_timeout_ms
    );
    tracing::info!("Entrance Delay: {}ms", config.playback.entrance_delay_ms);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

fn redact(token: &str) -> &'static str {
    if token.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
