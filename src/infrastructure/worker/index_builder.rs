//! Sound Index Builder - 从音效频道历史重建目录

use serde::Serialize;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{ChatPlatformPort, GuildStorePort};
use crate::domain::sound::{CatalogBuilder, CatalogSnapshot, IndexIssue};
use crate::domain::{GuildId, MessageId};

/// Builder 配置
#[derive(Debug, Clone)]
pub struct IndexBuilderConfig {
    /// 每页消息数（平台上限 100）
    pub page_size: usize,
    pub media_extension: String,
}

impl Default for IndexBuilderConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            media_extension: "mp3".to_string(),
        }
    }
}

/// 一次重建的统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub guild_id: GuildId,
    pub sounds: usize,
    pub entrances: usize,
    pub scanned_messages: usize,
    pub pages: usize,
    pub issues: usize,
}

/// 音效索引构建器
///
/// 分页拉取历史时不持有任何状态锁，完成后一次性替换快照
pub struct SoundIndexBuilder {
    platform: Arc<dyn ChatPlatformPort>,
    store: Arc<dyn GuildStorePort>,
    config: IndexBuilderConfig,
}

impl SoundIndexBuilder {
    pub fn new(
        platform: Arc<dyn ChatPlatformPort>,
        store: Arc<dyn GuildStorePort>,
        config: IndexBuilderConfig,
    ) -> Self {
        Self {
            platform,
            store,
            config,
        }
    }

    pub fn media_extension(&self) -> &str {
        &self.config.media_extension
    }

    /// 重建单个 guild 的目录与入场音绑定
    pub async fn rebuild(&self, guild_id: GuildId) -> Result<RebuildSummary, ApplicationError> {
        let channels = self.store.channels(guild_id)?;
        let (snapshot, pages) = self.crawl(channels.sounds_channel).await?;

        report_issues(guild_id, &snapshot.issues);

        let summary = RebuildSummary {
            guild_id,
            sounds: snapshot.catalog.len(),
            entrances: snapshot.entrances.len(),
            scanned_messages: snapshot.scanned_messages,
            pages,
            issues: snapshot.issues.len(),
        };
        self.store.install_snapshot(guild_id, snapshot)?;

        tracing::info!(
            guild_id = %guild_id,
            sounds = summary.sounds,
            entrances = summary.entrances,
            scanned = summary.scanned_messages,
            pages = summary.pages,
            "Sound index rebuilt"
        );
        Ok(summary)
    }

    /// 重建所有已注册 guild，单个失败不影响其他 guild
    pub async fn rebuild_all(&self) -> Vec<RebuildSummary> {
        let mut summaries = Vec::new();
        for guild_id in self.store.guild_ids() {
            match self.rebuild(guild_id).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    tracing::error!(
                        guild_id = %guild_id,
                        error = %e,
                        "Rebuild failed, keeping stale catalog"
                    );
                }
            }
        }
        summaries
    }

    /// 新到旧逐页拉取，直到某页不足一整页
    async fn crawl(
        &self,
        channel_id: crate::domain::ChannelId,
    ) -> Result<(CatalogSnapshot, usize), ApplicationError> {
        let mut builder = CatalogBuilder::new(self.config.media_extension.clone());
        let mut before: Option<MessageId> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .platform
                .fetch_messages_page(channel_id, before, self.config.page_size)
                .await?;
            pages += 1;
            builder.ingest_all(&page);

            tracing::debug!(
                channel_id = %channel_id,
                page = pages,
                messages = page.len(),
                "Fetched history page"
            );

            if page.len() < self.config.page_size {
                break;
            }
            match page.iter().map(|m| m.id).min() {
                Some(oldest) => before = Some(oldest),
                None => break,
            }
        }

        Ok((builder.finish(), pages))
    }
}

fn report_issues(guild_id: GuildId, issues: &[IndexIssue]) {
    for issue in issues {
        match issue {
            IndexIssue::MalformedTag { message_id, error } => {
                tracing::warn!(
                    guild_id = %guild_id,
                    message_id = %message_id,
                    error = %error,
                    "Skipping malformed tag"
                );
            }
            IndexIssue::InvalidTagValue {
                message_id,
                kind,
                value,
            } => {
                tracing::warn!(
                    guild_id = %guild_id,
                    message_id = %message_id,
                    kind = %kind,
                    value = %value,
                    "Skipping tag with invalid value"
                );
            }
            IndexIssue::DuplicateEntrance {
                user_id,
                kept,
                dropped,
            } => {
                let violation = ApplicationError::InvariantViolation(format!(
                    "user {} has entrance tags on messages {} and {}",
                    user_id, kept, dropped
                ));
                tracing::error!(
                    guild_id = %guild_id,
                    kept = %kept,
                    error = %violation,
                    "Duplicate entrance binding, keeping newest"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{GuildSetup, PlatformError};
    use crate::domain::{ChannelId, UserId};
    use crate::infrastructure::adapters::fake::FakePlatform;
    use crate::infrastructure::memory::InMemoryGuildStore;

    const GUILD: GuildId = GuildId::new(1);
    const SOUNDS: ChannelId = ChannelId::new(2);
    const BOT: UserId = UserId::new(900);
    const ALICE: UserId = UserId::new(100);

    fn setup() -> (Arc<FakePlatform>, Arc<InMemoryGuildStore>, SoundIndexBuilder) {
        let platform = Arc::new(FakePlatform::new(BOT));
        let store = InMemoryGuildStore::new().arc();
        store.register(GuildSetup {
            guild_id: GUILD,
            sounds_channel: SOUNDS,
            commands_channel: None,
        });
        let builder = SoundIndexBuilder::new(platform.clone(), store.clone(), IndexBuilderConfig::default());
        (platform, store, builder)
    }

    #[tokio::test]
    async fn test_two_pages_of_mixed_history() {
        let (platform, store, builder) = setup();
        for i in 1..=150u64 {
            let filename = if i <= 120 {
                format!("clip{}.mp3", i)
            } else {
                format!("notes{}.txt", i)
            };
            platform.add_sound_message(SOUNDS, MessageId::new(i), ALICE, &filename, "");
        }

        let summary = builder.rebuild(GUILD).await.unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.scanned_messages, 150);
        assert_eq!(summary.sounds, 120);
        assert_eq!(store.list_sounds(GUILD).unwrap().len(), 120);
        assert_eq!(
            platform.page_requests(),
            vec![(SOUNDS, None), (SOUNDS, Some(MessageId::new(51)))]
        );
    }

    #[tokio::test]
    async fn test_exact_page_boundary_fetches_empty_page() {
        let (platform, _, builder) = setup();
        for i in 1..=100u64 {
            platform.add_sound_message(SOUNDS, MessageId::new(i), ALICE, "a.mp3", "");
        }
        let summary = builder.rebuild(GUILD).await.unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.sounds, 1);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_catalog() {
        let (platform, store, builder) = setup();
        platform.add_sound_message(SOUNDS, MessageId::new(1), ALICE, "horn.mp3", "e:100;");
        builder.rebuild(GUILD).await.unwrap();
        assert!(store.entrance(GUILD, ALICE).unwrap().is_some());

        platform.delete_message(SOUNDS, MessageId::new(1)).await.unwrap();
        builder.rebuild(GUILD).await.unwrap();
        assert!(store.list_sounds(GUILD).unwrap().is_empty());
        assert!(store.entrance(GUILD, ALICE).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_stale_catalog() {
        let (platform, store, builder) = setup();
        platform.add_sound_message(SOUNDS, MessageId::new(1), ALICE, "horn.mp3", "");
        builder.rebuild(GUILD).await.unwrap();

        platform.fail_next_page(PlatformError::Transient("502".to_string()));
        let result = builder.rebuild(GUILD).await;
        assert!(matches!(result, Err(ApplicationError::UpstreamTransient(_))));
        assert_eq!(store.list_sounds(GUILD).unwrap(), vec!["horn"]);

        assert!(builder.rebuild_all().await.len() == 1);
    }
}
