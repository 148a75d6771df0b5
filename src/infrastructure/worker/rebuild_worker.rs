//! Rebuild Worker - 定期全量重建

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::SoundIndexBuilder;

/// 定期重建 Worker
///
/// 每个周期对所有已注册 guild 执行一次重建，修正增量更新期间累积的偏差
pub struct RebuildWorker {
    builder: Arc<SoundIndexBuilder>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl RebuildWorker {
    pub fn new(builder: Arc<SoundIndexBuilder>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            builder,
            interval,
            shutdown,
        }
    }

    /// 启动 Worker
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "RebuildWorker started");

        // 会话就绪时已经做过一次重建，首个周期从一个间隔之后开始
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let summaries = self.builder.rebuild_all().await;
                    tracing::info!(guilds = summaries.len(), "Periodic rebuild finished");
                }
            }
        }

        tracing::info!("RebuildWorker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{GuildSetup, GuildStorePort};
    use crate::domain::{ChannelId, GuildId, MessageId, UserId};
    use crate::infrastructure::adapters::fake::FakePlatform;
    use crate::infrastructure::memory::InMemoryGuildStore;
    use crate::infrastructure::worker::IndexBuilderConfig;

    #[tokio::test(start_paused = true)]
    async fn test_periodic_rebuild_picks_up_new_sounds() {
        let guild = GuildId::new(1);
        let sounds = ChannelId::new(2);
        let platform = Arc::new(FakePlatform::new(UserId::new(900)));
        let store = InMemoryGuildStore::new().arc();
        store.register(GuildSetup {
            guild_id: guild,
            sounds_channel: sounds,
            commands_channel: None,
        });
        let builder = Arc::new(SoundIndexBuilder::new(
            platform.clone(),
            store.clone(),
            IndexBuilderConfig::default(),
        ));
        let shutdown = CancellationToken::new();
        let worker = RebuildWorker::new(builder, Duration::from_secs(3600), shutdown.clone());
        let handle = tokio::spawn(worker.run());

        platform.add_sound_message(sounds, MessageId::new(1), UserId::new(5), "horn.mp3", "");
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert_eq!(store.list_sounds(guild).unwrap(), vec!["horn"]);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
