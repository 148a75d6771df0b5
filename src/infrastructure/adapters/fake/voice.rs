//! Fake Voice Gateway - 用于测试的语音连接
//!
//! 所有连接共享一条帧日志，便于断言播放不重叠

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::application::ports::{VoiceConnectionPort, VoiceError, VoiceGatewayPort};
use crate::domain::{ChannelId, GuildId};

/// 帧日志中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceLogEntry {
    Speaking(GuildId, bool),
    Frame(GuildId, Vec<u8>),
}

type VoiceLog = Arc<Mutex<Vec<VoiceLogEntry>>>;

fn record(log: &VoiceLog, entry: VoiceLogEntry) {
    log.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
}

/// Fake 语音连接
pub struct FakeVoiceConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    ready: AtomicBool,
    log: VoiceLog,
}

impl FakeVoiceConnection {
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceConnectionPort for FakeVoiceConnection {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn set_speaking(&self, speaking: bool) -> Result<(), VoiceError> {
        record(&self.log, VoiceLogEntry::Speaking(self.guild_id, speaking));
        Ok(())
    }

    async fn send_frame(&self, frame: Vec<u8>) -> Result<(), VoiceError> {
        if !self.is_ready() {
            return Err(VoiceError::NotReady);
        }
        record(&self.log, VoiceLogEntry::Frame(self.guild_id, frame));
        Ok(())
    }
}

/// Fake Voice Gateway
pub struct FakeVoiceGateway {
    connections: DashMap<GuildId, Arc<FakeVoiceConnection>>,
    log: VoiceLog,
    joins: AtomicUsize,
    /// 为 false 时新连接永远不就绪（用于测试加入超时）
    ready_on_join: AtomicBool,
}

impl FakeVoiceGateway {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            joins: AtomicUsize::new(0),
            ready_on_join: AtomicBool::new(true),
        }
    }

    pub fn set_ready_on_join(&self, ready: bool) {
        self.ready_on_join.store(ready, Ordering::SeqCst);
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<VoiceLogEntry> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 只取帧内容
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.log()
            .into_iter()
            .filter_map(|entry| match entry {
                VoiceLogEntry::Frame(_, frame) => Some(frame),
                VoiceLogEntry::Speaking(..) => None,
            })
            .collect()
    }

    pub fn fake_connection(&self, guild_id: GuildId) -> Option<Arc<FakeVoiceConnection>> {
        self.connections.get(&guild_id).map(|c| Arc::clone(c.value()))
    }
}

impl Default for FakeVoiceGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceGatewayPort for FakeVoiceGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnectionPort>, VoiceError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        let connection = Arc::new(FakeVoiceConnection {
            guild_id,
            channel_id,
            ready: AtomicBool::new(self.ready_on_join.load(Ordering::SeqCst)),
            log: Arc::clone(&self.log),
        });
        self.connections.insert(guild_id, Arc::clone(&connection));
        Ok(connection)
    }

    fn connection(&self, guild_id: GuildId) -> Option<Arc<dyn VoiceConnectionPort>> {
        self.connections
            .get(&guild_id)
            .map(|c| Arc::clone(c.value()) as Arc<dyn VoiceConnectionPort>)
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), VoiceError> {
        self.connections.remove(&guild_id);
        Ok(())
    }

    fn forget(&self, guild_id: GuildId) {
        self.connections.remove(&guild_id);
    }
}
