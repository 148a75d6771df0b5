//! Sound Queries

use crate::domain::GuildId;

/// 查找单个音效
#[derive(Debug, Clone)]
pub struct FindSound {
    pub guild_id: GuildId,
    pub name: String,
}

/// 列出所有音效名称
#[derive(Debug, Clone)]
pub struct ListSounds {
    pub guild_id: GuildId,
}
