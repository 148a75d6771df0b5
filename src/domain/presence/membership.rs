//! Voice Presence - 语音频道成员快照与状态迁移

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::ids::{ChannelId, GuildId, UserId};

/// 单个语音频道的成员
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceChannelMembership {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub members: BTreeSet<UserId>,
}

impl VoiceChannelMembership {
    pub fn new(guild_id: GuildId, channel_id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            channel_id,
            guild_id,
            name: name.into(),
            members: BTreeSet::new(),
        }
    }
}

/// 一次语音状态迁移 `(user, from?, to?)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceTransition {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub from: Option<ChannelId>,
    pub to: Option<ChannelId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Join,
    Leave,
    Switch,
    /// 同频道内的状态变化（静音等）或无意义事件
    Stay,
}

impl VoiceTransition {
    pub fn kind(&self) -> TransitionKind {
        match (self.from, self.to) {
            (None, Some(_)) => TransitionKind::Join,
            (Some(_), None) => TransitionKind::Leave,
            (Some(a), Some(b)) if a != b => TransitionKind::Switch,
            _ => TransitionKind::Stay,
        }
    }

    /// 只有"从无到有"的加入才触发入场音；频道间切换不触发
    pub fn triggers_entrance(&self) -> bool {
        self.kind() == TransitionKind::Join
    }
}

/// guild 内全部语音频道的成员视图
///
/// 不变量: 一个用户最多出现在一个频道中
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildVoiceMembership {
    channels: BTreeMap<ChannelId, VoiceChannelMembership>,
}

impl GuildVoiceMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从完整快照构建
    pub fn from_snapshot(
        channels: impl IntoIterator<Item = VoiceChannelMembership>,
        occupants: impl IntoIterator<Item = (UserId, ChannelId)>,
    ) -> Self {
        let mut membership = Self {
            channels: channels
                .into_iter()
                .map(|c| (c.channel_id, c))
                .collect(),
        };
        for (user_id, channel_id) in occupants {
            membership.remove_user(user_id);
            if let Some(channel) = membership.channels.get_mut(&channel_id) {
                channel.members.insert(user_id);
            }
        }
        membership
    }

    /// 应用迁移：先从当前所在频道移除，再加入目标频道
    ///
    /// 目标频道不在快照中（快照之后新建）时补建一个无名条目
    pub fn apply(&mut self, transition: &VoiceTransition) {
        self.remove_user(transition.user_id);
        if let Some(to) = transition.to {
            self.channels
                .entry(to)
                .or_insert_with(|| VoiceChannelMembership::new(transition.guild_id, to, ""))
                .members
                .insert(transition.user_id);
        }
    }

    pub fn channel_of(&self, user_id: UserId) -> Option<ChannelId> {
        self.channels
            .values()
            .find(|c| c.members.contains(&user_id))
            .map(|c| c.channel_id)
    }

    pub fn channel(&self, channel_id: ChannelId) -> Option<&VoiceChannelMembership> {
        self.channels.get(&channel_id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &VoiceChannelMembership> {
        self.channels.values()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn remove_user(&mut self, user_id: UserId) {
        for channel in self.channels.values_mut() {
            if channel.members.remove(&user_id) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(1);
    const LOBBY: ChannelId = ChannelId::new(10);
    const GAMING: ChannelId = ChannelId::new(11);
    const ALICE: UserId = UserId::new(100);

    fn transition(from: Option<ChannelId>, to: Option<ChannelId>) -> VoiceTransition {
        VoiceTransition {
            guild_id: GUILD,
            user_id: ALICE,
            from,
            to,
        }
    }

    fn membership() -> GuildVoiceMembership {
        GuildVoiceMembership::from_snapshot(
            vec![
                VoiceChannelMembership::new(GUILD, LOBBY, "Lobby"),
                VoiceChannelMembership::new(GUILD, GAMING, "Gaming"),
            ],
            vec![],
        )
    }

    #[test]
    fn test_entrance_trigger_selectivity() {
        assert!(transition(None, Some(LOBBY)).triggers_entrance());
        assert!(!transition(Some(LOBBY), Some(GAMING)).triggers_entrance());
        assert!(!transition(Some(LOBBY), None).triggers_entrance());
        assert!(!transition(Some(LOBBY), Some(LOBBY)).triggers_entrance());
        assert!(!transition(None, None).triggers_entrance());
    }

    #[test]
    fn test_join_switch_leave() {
        let mut m = membership();

        m.apply(&transition(None, Some(LOBBY)));
        assert_eq!(m.channel_of(ALICE), Some(LOBBY));

        m.apply(&transition(Some(LOBBY), Some(GAMING)));
        assert_eq!(m.channel_of(ALICE), Some(GAMING));
        assert!(m.channel(LOBBY).unwrap().members.is_empty());

        m.apply(&transition(Some(GAMING), None));
        assert_eq!(m.channel_of(ALICE), None);
    }

    #[test]
    fn test_stale_from_channel_still_keeps_single_membership() {
        let mut m = membership();
        m.apply(&transition(None, Some(LOBBY)));
        // 事件里的 from 与缓存不一致时，以缓存为准移除
        m.apply(&transition(None, Some(GAMING)));
        let count = m.channels().filter(|c| c.members.contains(&ALICE)).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unknown_target_channel_is_added() {
        let mut m = membership();
        let new_channel = ChannelId::new(12);
        m.apply(&transition(None, Some(new_channel)));
        assert_eq!(m.channel_of(ALICE), Some(new_channel));
    }

    #[test]
    fn test_snapshot_places_occupants() {
        let m = GuildVoiceMembership::from_snapshot(
            vec![VoiceChannelMembership::new(GUILD, LOBBY, "Lobby")],
            vec![(ALICE, LOBBY), (UserId::new(101), ChannelId::new(99))],
        );
        assert_eq!(m.channel_of(ALICE), Some(LOBBY));
        assert_eq!(m.channel_of(UserId::new(101)), None);
    }
}
