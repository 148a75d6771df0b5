//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{EncodeError, PlatformError, StoreError, VoiceError};
use crate::domain::sound::SoundError;
use crate::domain::tags::TagError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 标签格式错误
    #[error("Malformed tag: {0}")]
    MalformedTag(String),

    /// 上游暂时不可用（重试耗尽）
    #[error("Upstream temporarily unavailable: {0}")]
    UpstreamTransient(String),

    /// 加入语音频道失败
    #[error("Failed to join voice channel: {0}")]
    VoiceJoinFailed(String),

    /// 音频解码/编码失败
    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    /// 内部不变量被破坏（数据已按规则修复）
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// 该音效已经是此用户的入场音
    #[error("Already the entrance sound: {0}")]
    AlreadyEntrance(String),

    /// 数值越界
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<PlatformError> for ApplicationError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(what) => Self::NotFound {
                resource_type: "Platform resource",
                id: what,
            },
            e if e.is_transient() => Self::UpstreamTransient(e.to_string()),
            e => Self::ExternalServiceError(e.to_string()),
        }
    }
}

impl From<VoiceError> for ApplicationError {
    fn from(err: VoiceError) -> Self {
        Self::VoiceJoinFailed(err.to_string())
    }
}

impl From<EncodeError> for ApplicationError {
    fn from(err: EncodeError) -> Self {
        Self::EncodingFailure(err.to_string())
    }
}

impl From<TagError> for ApplicationError {
    fn from(err: TagError) -> Self {
        Self::MalformedTag(err.to_string())
    }
}

impl From<SoundError> for ApplicationError {
    fn from(err: SoundError) -> Self {
        match err {
            SoundError::VolumeOutOfRange(_) => Self::OutOfRange(err.to_string()),
            other => Self::ValidationError(other.to_string()),
        }
    }
}

impl From<StoreError> for ApplicationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GuildNotFound(id) => Self::not_found("Guild", id),
            StoreError::SoundNotFound(name) => Self::not_found("Sound", name),
            StoreError::SoundExists(name) => Self::validation(format!("Sound already exists: {}", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_mapping() {
        let e: ApplicationError = PlatformError::RateLimited { retry_after_ms: 10 }.into();
        assert!(matches!(e, ApplicationError::UpstreamTransient(_)));

        let e: ApplicationError = PlatformError::Rejected {
            status: 403,
            message: "Missing Permissions".to_string(),
        }
        .into();
        assert!(matches!(e, ApplicationError::ExternalServiceError(_)));
    }

    #[test]
    fn test_volume_error_is_out_of_range() {
        let e: ApplicationError = SoundError::VolumeOutOfRange(600).into();
        assert!(matches!(e, ApplicationError::OutOfRange(_)));
    }
}
