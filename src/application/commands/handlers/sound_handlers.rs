//! Sound Command Handlers

use std::sync::Arc;

use super::SoundMessageEditor;
use crate::application::commands::sound_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::GuildStorePort;
use crate::domain::sound::{file_name_for, validate_sound_name, Sound, Volume};
use crate::domain::tags::{self, Tag};
use crate::domain::{ChannelId, GuildId, MessageId};
use crate::infrastructure::worker::{RebuildSummary, SoundIndexBuilder};

// ============================================================================
// SetEntrance
// ============================================================================

/// SetEntrance Handler
///
/// 新消息加上 `e:<user>` 标签并更新绑定，再去掉旧入场音消息上的标签
pub struct SetEntranceHandler {
    store: Arc<dyn GuildStorePort>,
    editor: Arc<SoundMessageEditor>,
}

impl SetEntranceHandler {
    pub fn new(store: Arc<dyn GuildStorePort>, editor: Arc<SoundMessageEditor>) -> Self {
        Self { store, editor }
    }

    pub async fn handle(&self, cmd: SetEntranceCommand) -> Result<SetEntranceResponse, ApplicationError> {
        let channels = self.store.channels(cmd.guild_id)?;
        let sound = self
            .store
            .find_sound(cmd.guild_id, &cmd.name)?
            .ok_or_else(|| ApplicationError::not_found("Sound", &cmd.name))?;

        let previous = self.store.entrance(cmd.guild_id, cmd.user_id)?;
        if let Some(current) = &previous {
            if current.message_id == sound.message_id {
                return Err(ApplicationError::AlreadyEntrance(cmd.name));
            }
        }

        let tag = Tag::entrance(cmd.user_id);

        // 先给新消息打标签；失败时旧消息的标签保持不变
        let message = self
            .editor
            .ensure_bot_owned(cmd.guild_id, channels.sounds_channel, sound.message_id)
            .await?;
        self.editor
            .rewrite_tags(channels.sounds_channel, &message, |t| {
                if tags::contains(&t, &tag) {
                    t
                } else {
                    let mut t = t;
                    t.push(tag.clone());
                    t
                }
            })
            .await?;

        // 重新上传后目录中是新的消息 ID
        let bound = self
            .store
            .find_sound(cmd.guild_id, &cmd.name)?
            .ok_or_else(|| ApplicationError::not_found("Sound", &cmd.name))?;
        let message_id = bound.message_id;
        self.store.bind_entrance(cmd.guild_id, cmd.user_id, bound)?;

        if let Some(old) = &previous {
            self.retire_tag(cmd.guild_id, channels.sounds_channel, old.message_id, &tag)
                .await?;
        }

        tracing::info!(
            guild_id = %cmd.guild_id,
            user_id = %cmd.user_id,
            sound = %cmd.name,
            "Entrance sound set"
        );

        Ok(SetEntranceResponse {
            name: cmd.name,
            message_id,
            previous: previous.map(|p| p.message_id),
        })
    }

    async fn retire_tag(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        message_id: MessageId,
        tag: &Tag,
    ) -> Result<(), ApplicationError> {
        match self.editor.ensure_bot_owned(guild_id, channel_id, message_id).await {
            Ok(message) => {
                self.editor
                    .rewrite_tags(channel_id, &message, |t| tags::remove_exact(&t, tag))
                    .await?;
                Ok(())
            }
            // 旧消息已被删除时无需清理
            Err(ApplicationError::NotFound { .. }) => {
                tracing::debug!(message_id = %message_id, "Previous entrance message is gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// AdjustVolume
// ============================================================================

/// AdjustVolume Handler
pub struct AdjustVolumeHandler {
    store: Arc<dyn GuildStorePort>,
    editor: Arc<SoundMessageEditor>,
}

impl AdjustVolumeHandler {
    pub fn new(store: Arc<dyn GuildStorePort>, editor: Arc<SoundMessageEditor>) -> Self {
        Self { store, editor }
    }

    pub async fn handle(&self, cmd: AdjustVolumeCommand) -> Result<AdjustVolumeResponse, ApplicationError> {
        // 越界时不做任何修改
        let volume = Volume::new(cmd.volume)?;

        let channels = self.store.channels(cmd.guild_id)?;
        let sound = self
            .store
            .find_sound(cmd.guild_id, &cmd.name)?
            .ok_or_else(|| ApplicationError::not_found("Sound", &cmd.name))?;

        let message = self
            .editor
            .ensure_bot_owned(cmd.guild_id, channels.sounds_channel, sound.message_id)
            .await?;
        self.editor
            .rewrite_tags(channels.sounds_channel, &message, |t| tags::upsert(&t, Tag::volume(volume)))
            .await?;

        let updated = self.store.set_volume(cmd.guild_id, &cmd.name, volume)?;

        tracing::info!(
            guild_id = %cmd.guild_id,
            sound = %cmd.name,
            volume = volume.value(),
            "Sound volume adjusted"
        );

        Ok(AdjustVolumeResponse {
            name: cmd.name,
            message_id: updated.message_id,
            volume: updated.volume.value(),
            percent: updated.volume.percent(),
        })
    }
}

// ============================================================================
// RenameSound
// ============================================================================

/// RenameSound Handler
///
/// 以新文件名重新上传（标签随正文保留），删除原消息后移动目录条目
pub struct RenameSoundHandler {
    store: Arc<dyn GuildStorePort>,
    editor: Arc<SoundMessageEditor>,
}

impl RenameSoundHandler {
    pub fn new(store: Arc<dyn GuildStorePort>, editor: Arc<SoundMessageEditor>) -> Self {
        Self { store, editor }
    }

    pub async fn handle(&self, cmd: RenameSoundCommand) -> Result<RenameSoundResponse, ApplicationError> {
        validate_sound_name(&cmd.new_name)?;
        let channels = self.store.channels(cmd.guild_id)?;
        let sound = self
            .store
            .find_sound(cmd.guild_id, &cmd.name)?
            .ok_or_else(|| ApplicationError::not_found("Sound", &cmd.name))?;
        if self.store.find_sound(cmd.guild_id, &cmd.new_name)?.is_some() {
            return Err(ApplicationError::validation(format!(
                "Sound already exists: {}",
                cmd.new_name
            )));
        }

        let message = self
            .editor
            .platform()
            .fetch_message(channels.sounds_channel, sound.message_id)
            .await?;
        let uploaded = self
            .editor
            .reupload(
                channels.sounds_channel,
                &message,
                file_name_for(&cmd.new_name, self.editor.media_extension()),
            )
            .await?;

        let url = uploaded
            .single_attachment()
            .map(|a| a.url.clone())
            .unwrap_or(sound.url.clone());
        let renamed = Sound::new(uploaded.id, url).with_volume(sound.volume);
        self.store
            .rename_sound(cmd.guild_id, &cmd.name, &cmd.new_name, renamed)?;

        tracing::info!(
            guild_id = %cmd.guild_id,
            from = %cmd.name,
            to = %cmd.new_name,
            "Sound renamed"
        );

        Ok(RenameSoundResponse {
            name: cmd.new_name,
            message_id: uploaded.id,
        })
    }
}

// ============================================================================
// Rebuild
// ============================================================================

/// Rebuild Handler
pub struct RebuildHandler {
    builder: Arc<SoundIndexBuilder>,
}

impl RebuildHandler {
    pub fn new(builder: Arc<SoundIndexBuilder>) -> Self {
        Self { builder }
    }

    pub async fn handle(&self, cmd: RebuildCommand) -> Result<RebuildSummary, ApplicationError> {
        self.builder.rebuild(cmd.guild_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ChatPlatformPort, GuildSetup};
    use crate::domain::UserId;
    use crate::infrastructure::adapters::fake::FakePlatform;
    use crate::infrastructure::memory::InMemoryGuildStore;
    use crate::infrastructure::worker::IndexBuilderConfig;

    const GUILD: GuildId = GuildId::new(1);
    const SOUNDS: ChannelId = ChannelId::new(2);
    const BOT: UserId = UserId::new(900);
    const ALICE: UserId = UserId::new(100);

    struct Harness {
        platform: Arc<FakePlatform>,
        store: Arc<InMemoryGuildStore>,
        editor: Arc<SoundMessageEditor>,
        builder: Arc<SoundIndexBuilder>,
    }

    fn harness() -> Harness {
        let platform = Arc::new(FakePlatform::new(BOT));
        let store = InMemoryGuildStore::new().arc();
        store.register(GuildSetup {
            guild_id: GUILD,
            sounds_channel: SOUNDS,
            commands_channel: None,
        });
        let editor = Arc::new(SoundMessageEditor::new(platform.clone(), store.clone(), "mp3"));
        let builder = Arc::new(SoundIndexBuilder::new(
            platform.clone(),
            store.clone(),
            IndexBuilderConfig::default(),
        ));
        Harness {
            platform,
            store,
            editor,
            builder,
        }
    }

    fn content_of(h: &Harness, name: &str) -> String {
        let sound = h.store.find_sound(GUILD, name).unwrap().unwrap();
        h.platform.message(SOUNDS, sound.message_id).unwrap().content
    }

    #[tokio::test]
    async fn test_entrance_moves_between_sounds() {
        let h = harness();
        h.platform
            .add_sound_message(SOUNDS, MessageId::new(10), BOT, "horn.mp3", "e:100;");
        h.platform.add_sound_message(SOUNDS, MessageId::new(11), BOT, "air.mp3", "");
        h.builder.rebuild(GUILD).await.unwrap();

        let handler = SetEntranceHandler::new(h.store.clone(), h.editor.clone());
        let response = handler
            .handle(SetEntranceCommand {
                guild_id: GUILD,
                user_id: ALICE,
                name: "air".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.previous, Some(MessageId::new(10)));
        assert_eq!(content_of(&h, "horn"), "");
        assert_eq!(content_of(&h, "air"), "e:100;");
        let entrance = h.store.entrance(GUILD, ALICE).unwrap().unwrap();
        assert_eq!(entrance.message_id, MessageId::new(11));

        // 从消息历史重建后得到相同的绑定
        h.builder.rebuild(GUILD).await.unwrap();
        let rebuilt = h.store.entrance(GUILD, ALICE).unwrap().unwrap();
        assert_eq!(rebuilt.message_id, MessageId::new(11));
    }

    #[tokio::test]
    async fn test_entrance_on_foreign_messages_reuploads() {
        let h = harness();
        h.platform
            .add_sound_message(SOUNDS, MessageId::new(10), ALICE, "horn.mp3", "e:100;v:300;");
        h.platform.add_sound_message(SOUNDS, MessageId::new(11), ALICE, "air.mp3", "");
        h.builder.rebuild(GUILD).await.unwrap();

        let handler = SetEntranceHandler::new(h.store.clone(), h.editor.clone());
        handler
            .handle(SetEntranceCommand {
                guild_id: GUILD,
                user_id: ALICE,
                name: "air".to_string(),
            })
            .await
            .unwrap();

        let deleted = h.platform.deleted();
        assert!(deleted.contains(&MessageId::new(10)));
        assert!(deleted.contains(&MessageId::new(11)));

        let horn = h.store.find_sound(GUILD, "horn").unwrap().unwrap();
        assert_ne!(horn.message_id, MessageId::new(10));
        assert_eq!(horn.volume.value(), 300);
        assert_eq!(content_of(&h, "horn"), "v:300;");

        let air = h.store.find_sound(GUILD, "air").unwrap().unwrap();
        assert_eq!(h.store.entrance(GUILD, ALICE).unwrap().unwrap(), air);
        assert_eq!(content_of(&h, "air"), "e:100;");
    }

    #[tokio::test]
    async fn test_entrance_kept_when_new_message_is_gone() {
        let h = harness();
        h.platform
            .add_sound_message(SOUNDS, MessageId::new(10), BOT, "horn.mp3", "e:100;");
        h.platform.add_sound_message(SOUNDS, MessageId::new(11), BOT, "air.mp3", "");
        h.builder.rebuild(GUILD).await.unwrap();

        // 两次重建之间有人删除了 air
        h.platform.delete_message(SOUNDS, MessageId::new(11)).await.unwrap();

        let handler = SetEntranceHandler::new(h.store.clone(), h.editor.clone());
        let result = handler
            .handle(SetEntranceCommand {
                guild_id: GUILD,
                user_id: ALICE,
                name: "air".to_string(),
            })
            .await;

        assert!(result.is_err());
        assert_eq!(content_of(&h, "horn"), "e:100;");
        assert_eq!(
            h.store.entrance(GUILD, ALICE).unwrap().unwrap().message_id,
            MessageId::new(10)
        );

        h.builder.rebuild(GUILD).await.unwrap();
        assert_eq!(
            h.store.entrance(GUILD, ALICE).unwrap().unwrap().message_id,
            MessageId::new(10)
        );
    }

    #[tokio::test]
    async fn test_bot_user_looked_up_once() {
        let h = harness();
        h.platform.add_sound_message(SOUNDS, MessageId::new(10), BOT, "horn.mp3", "");
        h.builder.rebuild(GUILD).await.unwrap();

        let handler = AdjustVolumeHandler::new(h.store.clone(), h.editor.clone());
        for volume in [100, 200, 300] {
            handler
                .handle(AdjustVolumeCommand {
                    guild_id: GUILD,
                    name: "horn".to_string(),
                    volume,
                })
                .await
                .unwrap();
        }

        assert_eq!(h.platform.current_user_calls(), 1);
        assert_eq!(content_of(&h, "horn"), "v:300;");
    }

    #[tokio::test]
    async fn test_entrance_already_set() {
        let h = harness();
        h.platform
            .add_sound_message(SOUNDS, MessageId::new(10), BOT, "horn.mp3", "e:100;");
        h.builder.rebuild(GUILD).await.unwrap();

        let handler = SetEntranceHandler::new(h.store.clone(), h.editor.clone());
        let result = handler
            .handle(SetEntranceCommand {
                guild_id: GUILD,
                user_id: ALICE,
                name: "horn".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ApplicationError::AlreadyEntrance(_))));

        let missing = handler
            .handle(SetEntranceCommand {
                guild_id: GUILD,
                user_id: ALICE,
                name: "nope".to_string(),
            })
            .await;
        assert!(matches!(missing, Err(ApplicationError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_volume_out_of_range_leaves_sound_unchanged() {
        let h = harness();
        h.platform
            .add_sound_message(SOUNDS, MessageId::new(10), BOT, "horn.mp3", "v:200;");
        h.builder.rebuild(GUILD).await.unwrap();

        let handler = AdjustVolumeHandler::new(h.store.clone(), h.editor.clone());
        let result = handler
            .handle(AdjustVolumeCommand {
                guild_id: GUILD,
                name: "horn".to_string(),
                volume: 600,
            })
            .await;

        assert!(matches!(result, Err(ApplicationError::OutOfRange(_))));
        assert_eq!(h.store.find_sound(GUILD, "horn").unwrap().unwrap().volume.value(), 200);
        assert_eq!(content_of(&h, "horn"), "v:200;");
    }

    #[tokio::test]
    async fn test_adjust_volume_rewrites_tag_and_binding() {
        let h = harness();
        h.platform
            .add_sound_message(SOUNDS, MessageId::new(10), BOT, "horn.mp3", "v:10;e:100;v:20;");
        h.builder.rebuild(GUILD).await.unwrap();

        let handler = AdjustVolumeHandler::new(h.store.clone(), h.editor.clone());
        let response = handler
            .handle(AdjustVolumeCommand {
                guild_id: GUILD,
                name: "horn".to_string(),
                volume: 384,
            })
            .await
            .unwrap();

        assert_eq!(response.percent, 150);
        assert_eq!(content_of(&h, "horn"), "e:100;v:384;");
        assert_eq!(h.store.entrance(GUILD, ALICE).unwrap().unwrap().volume.value(), 384);
    }

    #[tokio::test]
    async fn test_rename_reuploads_with_tags() {
        let h = harness();
        h.platform
            .add_sound_message(SOUNDS, MessageId::new(10), ALICE, "horn.mp3", "e:100;v:300;");
        h.builder.rebuild(GUILD).await.unwrap();

        let handler = RenameSoundHandler::new(h.store.clone(), h.editor.clone());
        let response = handler
            .handle(RenameSoundCommand {
                guild_id: GUILD,
                name: "horn".to_string(),
                new_name: "bighorn".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(h.store.list_sounds(GUILD).unwrap(), vec!["bighorn"]);
        let uploaded = h.platform.message(SOUNDS, response.message_id).unwrap();
        assert_eq!(uploaded.attachments[0].filename, "bighorn.mp3");
        assert_eq!(uploaded.content, "e:100;v:300;");
        assert!(h.platform.fetch_message(SOUNDS, MessageId::new(10)).await.is_err());
        assert_eq!(
            h.store.entrance(GUILD, ALICE).unwrap().unwrap().message_id,
            response.message_id
        );
    }

    #[tokio::test]
    async fn test_rename_to_existing_name_fails() {
        let h = harness();
        h.platform.add_sound_message(SOUNDS, MessageId::new(10), BOT, "horn.mp3", "");
        h.platform.add_sound_message(SOUNDS, MessageId::new(11), BOT, "air.mp3", "");
        h.builder.rebuild(GUILD).await.unwrap();

        let handler = RenameSoundHandler::new(h.store.clone(), h.editor.clone());
        let result = handler
            .handle(RenameSoundCommand {
                guild_id: GUILD,
                name: "horn".to_string(),
                new_name: "air".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ApplicationError::ValidationError(_))));
        assert!(h.platform.deleted().is_empty());
    }
}
