//! Sound Context - Errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoundError {
    #[error("音量超出范围 (0-512): {0}")]
    VolumeOutOfRange(i64),

    #[error("无效的音量: {0}")]
    InvalidVolume(String),

    #[error("无效的音效名称: {0}")]
    InvalidName(String),
}
