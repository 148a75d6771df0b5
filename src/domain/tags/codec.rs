//! Tag Codec
//!
//! 语法: `tags = *(tag) ; tag = type ":" value ";"`，例如 `e:102938475;v:180;`

use super::{Tag, TagError, TagKind};

/// 序列化标签列表，保持顺序
pub fn encode(tags: &[Tag]) -> String {
    tags.iter().map(|t| t.to_string()).collect()
}

/// 严格解码，遇到第一个格式错误的片段即返回错误
pub fn decode(text: &str) -> Result<Vec<Tag>, TagError> {
    segments(text).map(parse_segment).collect()
}

/// 宽松解码：保留格式正确的标签，同时返回所有错误供调用方记录
pub fn decode_lenient(text: &str) -> (Vec<Tag>, Vec<TagError>) {
    let mut tags = Vec::new();
    let mut errors = Vec::new();
    for segment in segments(text) {
        match parse_segment(segment) {
            Ok(tag) => tags.push(tag),
            Err(e) => errors.push(e),
        }
    }
    (tags, errors)
}

/// 移除该类型的所有标签后追加新标签
pub fn upsert(tags: &[Tag], tag: Tag) -> Vec<Tag> {
    let mut updated = remove_kind(tags, tag.kind());
    updated.push(tag);
    updated
}

/// 移除该类型的所有标签
pub fn remove_kind(tags: &[Tag], kind: &TagKind) -> Vec<Tag> {
    tags.iter().filter(|t| t.kind() != kind).cloned().collect()
}

/// 只移除与给定标签完全相同的标签（例如某一个用户的 `e:` 标签）
pub fn remove_exact(tags: &[Tag], tag: &Tag) -> Vec<Tag> {
    tags.iter().filter(|t| *t != tag).cloned().collect()
}

pub fn contains(tags: &[Tag], tag: &Tag) -> bool {
    tags.iter().any(|t| t == tag)
}

fn segments(text: &str) -> impl Iterator<Item = &str> {
    text.split(';').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_segment(segment: &str) -> Result<Tag, TagError> {
    let (kind, value) = segment
        .split_once(':')
        .ok_or_else(|| TagError::Malformed(segment.to_string()))?;
    if kind.is_empty() {
        return Err(TagError::Malformed(segment.to_string()));
    }
    Tag::new(TagKind::parse(kind)?, value)
}
