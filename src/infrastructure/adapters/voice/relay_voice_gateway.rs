//! Relay Voice Gateway - 通过 WebSocket 中继进程收发语音
//!
//! 中继进程连接 `/ws/voice`，负责真正的语音 UDP/加密。本端只发送：
//! - JSON 控制消息：`join` / `leave` / `speaking`
//! - 二进制音频帧：`[guild_id: u64 BE][opus payload]`
//!
//! 中继回报 `ready` / `closed` 更新连接就绪状态

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::application::ports::{VoiceConnectionPort, VoiceError, VoiceGatewayPort};
use crate::domain::{ChannelId, GuildId};

/// 发往中继的控制消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum VoiceControl {
    Join {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    Leave {
        guild_id: GuildId,
    },
    Speaking {
        guild_id: GuildId,
        speaking: bool,
    },
}

/// 中继回报的状态消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum VoiceRelayEvent {
    Ready {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    Closed {
        guild_id: GuildId,
    },
}

/// 出站消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Control(VoiceControl),
    Audio { guild_id: GuildId, payload: Vec<u8> },
}

impl RelayFrame {
    /// 二进制帧：8 字节大端 guild_id + opus 数据
    pub fn encode_audio(guild_id: GuildId, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&guild_id.get().to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }
}

/// 当前连接的中继
struct RelayLink {
    generation: u64,
    sender: mpsc::Sender<RelayFrame>,
}

type SharedLink = Arc<RwLock<Option<RelayLink>>>;

async fn send(link: &SharedLink, frame: RelayFrame) -> Result<(), VoiceError> {
    let sender = link
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .map(|l| l.sender.clone())
        .ok_or_else(|| VoiceError::Unavailable("no voice relay connected".to_string()))?;
    sender.send(frame).await.map_err(|_| VoiceError::Closed)
}

/// 单个 guild 的中继语音连接
pub struct RelayVoiceConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    ready: AtomicBool,
    link: SharedLink,
}

#[async_trait]
impl VoiceConnectionPort for RelayVoiceConnection {
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
        send(
            &self.link,
            RelayFrame::Control(VoiceControl::Speaking {
                guild_id: self.guild_id,
                speaking,
            }),
        )
        .await
    }

    async fn send_frame(&self, frame: Vec<u8>) -> Result<(), VoiceError> {
        if !self.is_ready() {
            return Err(VoiceError::NotReady);
        }
        send(
            &self.link,
            RelayFrame::Audio {
                guild_id: self.guild_id,
                payload: frame,
            },
        )
        .await
    }
}

/// 中继语音网关
pub struct RelayVoiceGateway {
    link: SharedLink,
    connections: DashMap<GuildId, Arc<RelayVoiceConnection>>,
    generations: AtomicU64,
    buffer: usize,
}

impl RelayVoiceGateway {
    /// `buffer` 为出站队列长度，队列满时发送方等待
    pub fn new(buffer: usize) -> Self {
        Self {
            link: Arc::new(RwLock::new(None)),
            connections: DashMap::new(),
            generations: AtomicU64::new(0),
            buffer: buffer.max(1),
        }
    }

    /// 中继连入，返回本次连接的代号与出站队列
    ///
    /// 新中继替换旧中继，已有语音连接全部失效
    pub fn attach(&self) -> (u64, mpsc::Receiver<RelayFrame>) {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (sender, receiver) = mpsc::channel(self.buffer);
        *self.link.write().unwrap_or_else(|e| e.into_inner()) = Some(RelayLink { generation, sender });
        self.drop_connections();
        tracing::info!(generation = generation, "Voice relay attached");
        (generation, receiver)
    }

    /// 中继断开；只有仍是当前中继时才清理
    pub fn detach(&self, generation: u64) {
        let mut link = self.link.write().unwrap_or_else(|e| e.into_inner());
        if link.as_ref().map(|l| l.generation) != Some(generation) {
            return;
        }
        *link = None;
        drop(link);
        self.drop_connections();
        tracing::info!(generation = generation, "Voice relay detached");
    }

    pub fn is_attached(&self) -> bool {
        self.link.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// 处理中继回报
    pub fn handle_event(&self, event: VoiceRelayEvent) {
        match event {
            VoiceRelayEvent::Ready {
                guild_id,
                channel_id,
            } => match self.connections.get(&guild_id) {
                Some(connection) if connection.channel_id == channel_id => {
                    connection.ready.store(true, Ordering::SeqCst);
                    tracing::info!(guild_id = %guild_id, channel_id = %channel_id, "Voice connection ready");
                }
                _ => {
                    tracing::debug!(guild_id = %guild_id, channel_id = %channel_id, "Ignoring stale voice ready");
                }
            },
            VoiceRelayEvent::Closed { guild_id } => {
                if let Some((_, connection)) = self.connections.remove(&guild_id) {
                    connection.ready.store(false, Ordering::SeqCst);
                }
                tracing::info!(guild_id = %guild_id, "Voice connection closed by relay");
            }
        }
    }

    fn drop_connections(&self) {
        for entry in self.connections.iter() {
            entry.value().ready.store(false, Ordering::SeqCst);
        }
        self.connections.clear();
    }
}

impl Default for RelayVoiceGateway {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl VoiceGatewayPort for RelayVoiceGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnectionPort>, VoiceError> {
        let connection = Arc::new(RelayVoiceConnection {
            guild_id,
            channel_id,
            ready: AtomicBool::new(false),
            link: Arc::clone(&self.link),
        });
        if let Some(previous) = self.connections.insert(guild_id, Arc::clone(&connection)) {
            previous.ready.store(false, Ordering::SeqCst);
        }

        if let Err(e) = send(&self.link, RelayFrame::Control(VoiceControl::Join { guild_id, channel_id })).await {
            self.connections.remove(&guild_id);
            return Err(e);
        }
        tracing::debug!(guild_id = %guild_id, channel_id = %channel_id, "Voice join requested");
        Ok(connection)
    }

    fn connection(&self, guild_id: GuildId) -> Option<Arc<dyn VoiceConnectionPort>> {
        self.connections
            .get(&guild_id)
            .map(|c| Arc::clone(c.value()) as Arc<dyn VoiceConnectionPort>)
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), VoiceError> {
        self.forget(guild_id);
        send(&self.link, RelayFrame::Control(VoiceControl::Leave { guild_id })).await
    }

    fn forget(&self, guild_id: GuildId) {
        if let Some((_, connection)) = self.connections.remove(&guild_id) {
            connection.ready.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(1);
    const LOBBY: ChannelId = ChannelId::new(10);

    #[tokio::test]
    async fn test_join_without_relay_is_unavailable() {
        let gateway = RelayVoiceGateway::default();
        let result = gateway.join(GUILD, LOBBY).await;
        assert!(matches!(result, Err(VoiceError::Unavailable(_))));
        assert!(gateway.connection(GUILD).is_none());
    }

    #[tokio::test]
    async fn test_join_ready_and_send_frame() {
        let gateway = RelayVoiceGateway::default();
        let (_, mut outbound) = gateway.attach();

        let connection = gateway.join(GUILD, LOBBY).await.unwrap();
        assert_eq!(
            outbound.recv().await,
            Some(RelayFrame::Control(VoiceControl::Join {
                guild_id: GUILD,
                channel_id: LOBBY
            }))
        );
        assert!(!connection.is_ready());
        assert!(matches!(connection.send_frame(vec![1]).await, Err(VoiceError::NotReady)));

        gateway.handle_event(VoiceRelayEvent::Ready {
            guild_id: GUILD,
            channel_id: LOBBY,
        });
        assert!(connection.is_ready());

        connection.send_frame(vec![7, 8]).await.unwrap();
        assert_eq!(
            outbound.recv().await,
            Some(RelayFrame::Audio {
                guild_id: GUILD,
                payload: vec![7, 8]
            })
        );
    }

    #[tokio::test]
    async fn test_closed_and_detach_drop_connections() {
        let gateway = RelayVoiceGateway::default();
        let (generation, _outbound) = gateway.attach();
        let connection = gateway.join(GUILD, LOBBY).await.unwrap();
        gateway.handle_event(VoiceRelayEvent::Ready {
            guild_id: GUILD,
            channel_id: LOBBY,
        });

        gateway.handle_event(VoiceRelayEvent::Closed { guild_id: GUILD });
        assert!(!connection.is_ready());
        assert!(gateway.connection(GUILD).is_none());

        // 旧代号的断开不影响新中继
        let (_, _newer) = gateway.attach();
        gateway.detach(generation);
        assert!(gateway.is_attached());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&VoiceControl::Speaking {
            guild_id: GUILD,
            speaking: true,
        })
        .unwrap();
        assert_eq!(json, r#"{"op":"speaking","guild_id":"1","speaking":true}"#);

        let event: VoiceRelayEvent = serde_json::from_str(r#"{"op":"ready","guild_id":"1","channel_id":"10"}"#).unwrap();
        assert_eq!(
            event,
            VoiceRelayEvent::Ready {
                guild_id: GUILD,
                channel_id: LOBBY
            }
        );

        assert_eq!(RelayFrame::encode_audio(GUILD, &[9]), vec![0, 0, 0, 0, 0, 0, 0, 1, 9]);
    }
}
