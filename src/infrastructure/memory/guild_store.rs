//! In-Memory Guild State Store Implementation

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::application::ports::{GuildChannels, GuildSetup, GuildStorePort, PlaybackHandle, StoreError};
use crate::domain::presence::{GuildVoiceMembership, VoiceChannelMembership, VoiceTransition};
use crate::domain::sound::{CatalogSnapshot, EntranceBindings, Sound, SoundCatalog, Volume};
use crate::domain::{ChannelId, GuildId, MessageId, UserId};

/// 单个 guild 的全部状态
#[derive(Debug)]
struct GuildState {
    channels: GuildChannels,
    catalog: SoundCatalog,
    entrances: EntranceBindings,
    /// None 表示尚未取得语音快照
    membership: Option<GuildVoiceMembership>,
    playback: Option<PlaybackHandle>,
    last_rebuild: Option<DateTime<Utc>>,
}

impl GuildState {
    fn new(channels: GuildChannels) -> Self {
        Self {
            channels,
            catalog: SoundCatalog::new(),
            entrances: EntranceBindings::new(),
            membership: None,
            playback: None,
            last_rebuild: None,
        }
    }

    /// 让指向旧消息的入场音绑定看到新记录
    fn retarget_entrances(&mut self, old: MessageId, sound: &Sound) {
        for bound in self.entrances.values_mut() {
            if bound.message_id == old {
                *bound = sound.clone();
            }
        }
    }
}

struct GuildEntry {
    state: Mutex<GuildState>,
}

impl GuildEntry {
    fn lock(&self) -> MutexGuard<'_, GuildState> {
        // 临界区内没有可能 panic 的逻辑，中毒时直接取回数据
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 内存 guild 状态仓库
///
/// 外层 DashMap 按 guild 分片，每个 guild 有独立的状态锁
pub struct InMemoryGuildStore {
    guilds: DashMap<GuildId, Arc<GuildEntry>>,
}

impl InMemoryGuildStore {
    pub fn new() -> Self {
        Self {
            guilds: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn entry(&self, guild_id: GuildId) -> Result<Arc<GuildEntry>, StoreError> {
        self.guilds
            .get(&guild_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(StoreError::GuildNotFound(guild_id))
    }

    /// 在 guild 状态锁内执行闭包
    fn with_state<R>(
        &self,
        guild_id: GuildId,
        f: impl FnOnce(&mut GuildState) -> R,
    ) -> Result<R, StoreError> {
        let entry = self.entry(guild_id)?;
        let mut state = entry.lock();
        Ok(f(&mut state))
    }
}

impl Default for InMemoryGuildStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GuildStorePort for InMemoryGuildStore {
    fn register(&self, setup: GuildSetup) {
        let channels = GuildChannels {
            sounds_channel: setup.sounds_channel,
            commands_channel: setup.commands_channel,
        };
        let entry = self
            .guilds
            .entry(setup.guild_id)
            .or_insert_with(|| {
                Arc::new(GuildEntry {
                    state: Mutex::new(GuildState::new(channels)),
                })
            })
            .value()
            .clone();
        entry.lock().channels = channels;
        tracing::info!(
            guild_id = %setup.guild_id,
            sounds_channel = %setup.sounds_channel,
            "Guild registered"
        );
    }

    fn guild_ids(&self) -> Vec<GuildId> {
        let mut ids: Vec<GuildId> = self.guilds.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    fn contains(&self, guild_id: GuildId) -> bool {
        self.guilds.contains_key(&guild_id)
    }

    fn channels(&self, guild_id: GuildId) -> Result<GuildChannels, StoreError> {
        self.with_state(guild_id, |s| s.channels)
    }

    fn find_sound(&self, guild_id: GuildId, name: &str) -> Result<Option<Sound>, StoreError> {
        self.with_state(guild_id, |s| s.catalog.get(name).cloned())
    }

    fn list_sounds(&self, guild_id: GuildId) -> Result<Vec<String>, StoreError> {
        self.with_state(guild_id, |s| {
            let mut names: Vec<String> = s.catalog.keys().cloned().collect();
            names.sort();
            names
        })
    }

    fn upsert_sound(&self, guild_id: GuildId, name: &str, sound: Sound) -> Result<(), StoreError> {
        self.with_state(guild_id, |s| {
            s.catalog.insert(name.to_string(), sound);
        })
    }

    fn remove_sound(&self, guild_id: GuildId, name: &str) -> Result<Option<Sound>, StoreError> {
        self.with_state(guild_id, |s| {
            let removed = s.catalog.remove(name)?;
            s.entrances.retain(|_, bound| bound.message_id != removed.message_id);
            Some(removed)
        })
    }

    fn replace_sound(&self, guild_id: GuildId, name: &str, sound: Sound) -> Result<(), StoreError> {
        self.with_state(guild_id, |s| {
            let old = s
                .catalog
                .get(name)
                .map(|existing| existing.message_id)
                .ok_or_else(|| StoreError::SoundNotFound(name.to_string()))?;
            s.retarget_entrances(old, &sound);
            s.catalog.insert(name.to_string(), sound);
            Ok(())
        })?
    }

    fn rename_sound(
        &self,
        guild_id: GuildId,
        name: &str,
        new_name: &str,
        sound: Sound,
    ) -> Result<(), StoreError> {
        self.with_state(guild_id, |s| {
            if s.catalog.contains_key(new_name) {
                return Err(StoreError::SoundExists(new_name.to_string()));
            }
            let old = s
                .catalog
                .remove(name)
                .ok_or_else(|| StoreError::SoundNotFound(name.to_string()))?;
            s.retarget_entrances(old.message_id, &sound);
            s.catalog.insert(new_name.to_string(), sound);
            Ok(())
        })?
    }

    fn set_volume(&self, guild_id: GuildId, name: &str, volume: Volume) -> Result<Sound, StoreError> {
        self.with_state(guild_id, |s| {
            let sound = s
                .catalog
                .get_mut(name)
                .ok_or_else(|| StoreError::SoundNotFound(name.to_string()))?;
            sound.volume = volume;
            let updated = sound.clone();
            s.retarget_entrances(updated.message_id, &updated);
            Ok(updated)
        })?
    }

    fn entrance(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<Sound>, StoreError> {
        self.with_state(guild_id, |s| s.entrances.get(&user_id).cloned())
    }

    fn bind_entrance(&self, guild_id: GuildId, user_id: UserId, sound: Sound) -> Result<Option<Sound>, StoreError> {
        self.with_state(guild_id, |s| s.entrances.insert(user_id, sound))
    }

    fn unbind_entrance(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<Sound>, StoreError> {
        self.with_state(guild_id, |s| s.entrances.remove(&user_id))
    }

    fn install_snapshot(&self, guild_id: GuildId, snapshot: CatalogSnapshot) -> Result<(), StoreError> {
        let sounds = snapshot.catalog.len();
        let entrances = snapshot.entrances.len();
        self.with_state(guild_id, |s| {
            s.catalog = snapshot.catalog;
            s.entrances = snapshot.entrances;
            s.last_rebuild = Some(Utc::now());
        })?;
        tracing::debug!(
            guild_id = %guild_id,
            sounds = sounds,
            entrances = entrances,
            "Catalog snapshot installed"
        );
        Ok(())
    }

    fn last_rebuild(&self, guild_id: GuildId) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.with_state(guild_id, |s| s.last_rebuild)
    }

    fn has_membership(&self, guild_id: GuildId) -> Result<bool, StoreError> {
        self.with_state(guild_id, |s| s.membership.is_some())
    }

    fn install_membership(&self, guild_id: GuildId, membership: GuildVoiceMembership) -> Result<(), StoreError> {
        self.with_state(guild_id, |s| {
            s.membership = Some(membership);
        })
    }

    fn apply_transition(&self, transition: &VoiceTransition) -> Result<(), StoreError> {
        self.with_state(transition.guild_id, |s| {
            s.membership
                .get_or_insert_with(GuildVoiceMembership::new)
                .apply(transition);
        })
    }

    fn voice_channels(&self, guild_id: GuildId) -> Result<Vec<VoiceChannelMembership>, StoreError> {
        self.with_state(guild_id, |s| {
            s.membership
                .as_ref()
                .map(|m| m.channels().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<ChannelId>, StoreError> {
        self.with_state(guild_id, |s| s.membership.as_ref().and_then(|m| m.channel_of(user_id)))
    }

    fn set_playback(&self, guild_id: GuildId, handle: PlaybackHandle) -> Result<(), StoreError> {
        self.with_state(guild_id, |s| {
            s.playback = Some(handle);
        })
    }

    fn playback(&self, guild_id: GuildId) -> Result<Option<PlaybackHandle>, StoreError> {
        self.with_state(guild_id, |s| s.playback.clone())
    }

    fn clear_playback(&self, guild_id: GuildId, id: Uuid) -> Result<bool, StoreError> {
        self.with_state(guild_id, |s| match &s.playback {
            Some(handle) if handle.id == id => {
                s.playback = None;
                true
            }
            _ => false,
        })
    }
}
