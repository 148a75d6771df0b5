//! Gateway Cache - 网关中继事件与语音在线缓存
//!
//! 网关进程通过 `/ws/gateway` 推送 JSON 事件。REST 没有列出语音状态的接口，
//! 所以这里按 guild 缓存语音在线用户，供 `list_voice_states` 读取。

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::ports::{PlatformEvent, VoiceOccupant, VoiceStateChange};
use crate::domain::{ChannelId, ChatMessage, GuildId, UserId};

/// 网关中继推送的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum GatewayEvent {
    Ready {
        bot_user_id: UserId,
        guild_ids: Vec<GuildId>,
    },
    /// guild 当前语音状态全量快照
    VoiceSnapshot {
        guild_id: GuildId,
        occupants: Vec<VoiceOccupant>,
    },
    MessageCreate(ChatMessage),
    VoiceStateUpdate {
        guild_id: GuildId,
        user_id: UserId,
        #[serde(default)]
        is_bot: bool,
        /// 为空表示离开语音
        channel_id: Option<ChannelId>,
    },
}

/// 语音在线缓存
#[derive(Default)]
pub struct GatewayCache {
    voice: DashMap<GuildId, HashMap<UserId, VoiceOccupant>>,
}

impl GatewayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 更新缓存并转换为平台事件
    ///
    /// 快照只更新缓存，不产生事件；语音变化的 `from` 取自缓存中的旧状态
    pub fn ingest(&self, event: GatewayEvent) -> Option<PlatformEvent> {
        match event {
            GatewayEvent::Ready {
                bot_user_id,
                guild_ids,
            } => Some(PlatformEvent::SessionReady {
                bot_user_id,
                guild_ids,
            }),
            GatewayEvent::VoiceSnapshot {
                guild_id,
                occupants,
            } => {
                let occupants = occupants.into_iter().map(|o| (o.user_id, o)).collect();
                self.voice.insert(guild_id, occupants);
                None
            }
            GatewayEvent::MessageCreate(message) => Some(PlatformEvent::MessageCreated(message)),
            GatewayEvent::VoiceStateUpdate {
                guild_id,
                user_id,
                is_bot,
                channel_id,
            } => {
                let mut guild = self.voice.entry(guild_id).or_default();
                let from = match channel_id {
                    Some(to) => guild.insert(
                        user_id,
                        VoiceOccupant {
                            user_id,
                            channel_id: to,
                            is_bot,
                        },
                    ),
                    None => guild.remove(&user_id),
                }
                .map(|previous| previous.channel_id);

                Some(PlatformEvent::VoiceStateChanged(VoiceStateChange {
                    guild_id,
                    user_id,
                    is_bot,
                    from,
                    to: channel_id,
                }))
            }
        }
    }

    pub fn occupants(&self, guild_id: GuildId) -> Vec<VoiceOccupant> {
        let mut occupants: Vec<VoiceOccupant> = self
            .voice
            .get(&guild_id)
            .map(|guild| guild.values().copied().collect())
            .unwrap_or_default();
        occupants.sort_by_key(|o| o.user_id);
        occupants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(1);
    const LOBBY: ChannelId = ChannelId::new(10);
    const AFK: ChannelId = ChannelId::new(11);
    const ALICE: UserId = UserId::new(100);

    fn update(channel_id: Option<ChannelId>) -> GatewayEvent {
        GatewayEvent::VoiceStateUpdate {
            guild_id: GUILD,
            user_id: ALICE,
            is_bot: false,
            channel_id,
        }
    }

    fn change(event: Option<PlatformEvent>) -> VoiceStateChange {
        match event {
            Some(PlatformEvent::VoiceStateChanged(change)) => change,
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_gateway_json() {
        let json = r#"{"event":"voice_state_update","data":{"guild_id":"1","user_id":100,"channel_id":"10"}}"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, update(Some(LOBBY)));

        let json = r#"{"event":"ready","data":{"bot_user_id":"900","guild_ids":["1","2"]}}"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, GatewayEvent::Ready { guild_ids, .. } if guild_ids.len() == 2));
    }

    #[test]
    fn test_voice_update_derives_previous_channel() {
        let cache = GatewayCache::new();

        let joined = change(cache.ingest(update(Some(LOBBY))));
        assert_eq!((joined.from, joined.to), (None, Some(LOBBY)));

        let moved = change(cache.ingest(update(Some(AFK))));
        assert_eq!((moved.from, moved.to), (Some(LOBBY), Some(AFK)));

        let left = change(cache.ingest(update(None)));
        assert_eq!((left.from, left.to), (Some(AFK), None));
        assert!(cache.occupants(GUILD).is_empty());
    }

    #[test]
    fn test_snapshot_replaces_occupants() {
        let cache = GatewayCache::new();
        cache.ingest(update(Some(AFK)));

        let snapshot = GatewayEvent::VoiceSnapshot {
            guild_id: GUILD,
            occupants: vec![VoiceOccupant {
                user_id: ALICE,
                channel_id: LOBBY,
                is_bot: false,
            }],
        };
        assert!(cache.ingest(snapshot).is_none());
        assert_eq!(cache.occupants(GUILD)[0].channel_id, LOBBY);

        let moved = change(cache.ingest(update(Some(AFK))));
        assert_eq!(moved.from, Some(LOBBY));
    }
}
