//! Tag Context - Errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("标签格式错误（缺少 ':' 分隔符）: {0}")]
    Malformed(String),

    #[error("无效的标签类型: {0}")]
    InvalidKind(String),

    #[error("无效的标签值 {kind}:{value}")]
    InvalidValue { kind: String, value: String },
}
