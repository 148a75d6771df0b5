//! Tag Context - 消息内嵌元数据
//!
//! 音效消息正文中的 `type:value;` 标签是入场音与音量的唯一持久化形式。
//! - `e:<user_id>;` 该音效是此用户的入场音
//! - `v:<volume>;`  音效音量（0-512，256 为原始音量）

mod codec;
mod errors;

pub use codec::{contains, decode, decode_lenient, encode, remove_exact, remove_kind, upsert};
pub use errors::TagError;

use std::fmt;

use super::ids::UserId;
use super::sound::Volume;

/// 标签类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// `e` - 入场音绑定，值为用户 ID
    Entrance,
    /// `v` - 音量，值为整数
    Volume,
    /// 其他工具写入的未知类型，原样保留
    Other(String),
}

impl TagKind {
    pub fn as_str(&self) -> &str {
        match self {
            TagKind::Entrance => "e",
            TagKind::Volume => "v",
            TagKind::Other(s) => s.as_str(),
        }
    }

    /// 解析类型标记，`e`/`v` 以外的非空标记归为 Other
    pub fn parse(s: &str) -> Result<Self, TagError> {
        match s {
            "e" => Ok(TagKind::Entrance),
            "v" => Ok(TagKind::Volume),
            other if is_valid_token(other) => Ok(TagKind::Other(other.to_string())),
            other => Err(TagError::InvalidKind(other.to_string())),
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个标签 `(type, value)`
///
/// 不变量:
/// - value 非空，不含 `:`、`;` 或空白
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    kind: TagKind,
    value: String,
}

impl Tag {
    pub fn new(kind: TagKind, value: impl Into<String>) -> Result<Self, TagError> {
        let value = value.into();
        if !is_valid_token(&value) {
            return Err(TagError::InvalidValue {
                kind: kind.as_str().to_string(),
                value,
            });
        }
        if let TagKind::Other(name) = &kind {
            // Other("e") 会在解码后变成 Entrance，破坏往返一致性
            if name == "e" || name == "v" || !is_valid_token(name) {
                return Err(TagError::InvalidKind(name.clone()));
            }
        }
        Ok(Self { kind, value })
    }

    /// `e:<user_id>`
    pub fn entrance(user_id: UserId) -> Self {
        Self {
            kind: TagKind::Entrance,
            value: user_id.to_string(),
        }
    }

    /// `v:<volume>`
    pub fn volume(volume: Volume) -> Self {
        Self {
            kind: TagKind::Volume,
            value: volume.value().to_string(),
        }
    }

    pub fn kind(&self) -> &TagKind {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{};", self.kind, self.value)
    }
}

fn is_valid_token(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c == ':' || c == ';' || c.is_whitespace())
}
