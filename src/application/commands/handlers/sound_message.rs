//! Sound Message Editor - 音效消息的标签改写与重新上传
//!
//! 平台只允许机器人编辑自己发出的消息，其他人上传的音效
//! 需要先由机器人重新上传（同名、同标签），再删除原消息

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::application::error::ApplicationError;
use crate::application::ports::{ChatPlatformPort, FileUpload, GuildStorePort};
use crate::domain::sound::{clip_name, file_name_for, Sound};
use crate::domain::tags::{self, Tag};
use crate::domain::{ChannelId, ChatMessage, GuildId, MessageId, UserId};

pub struct SoundMessageEditor {
    platform: Arc<dyn ChatPlatformPort>,
    store: Arc<dyn GuildStorePort>,
    media_extension: String,
    /// 机器人自身 ID，首次使用时查询一次
    bot_user_id: OnceCell<UserId>,
}

impl SoundMessageEditor {
    pub fn new(
        platform: Arc<dyn ChatPlatformPort>,
        store: Arc<dyn GuildStorePort>,
        media_extension: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            store,
            media_extension: media_extension.into(),
            bot_user_id: OnceCell::new(),
        }
    }

    async fn bot_user_id(&self) -> Result<UserId, ApplicationError> {
        let user_id = self
            .bot_user_id
            .get_or_try_init(|| self.platform.current_user())
            .await?;
        Ok(*user_id)
    }

    pub fn platform(&self) -> &Arc<dyn ChatPlatformPort> {
        &self.platform
    }

    pub fn media_extension(&self) -> &str {
        &self.media_extension
    }

    /// 以新文件名重新上传消息的附件，正文原样保留，成功后删除原消息
    pub async fn reupload(
        &self,
        channel_id: ChannelId,
        message: &ChatMessage,
        filename: String,
    ) -> Result<ChatMessage, ApplicationError> {
        let attachment = message
            .single_attachment()
            .ok_or_else(|| ApplicationError::validation(format!("message {} has no single attachment", message.id)))?;
        let data = self.platform.download_attachment(&attachment.url).await?;
        let uploaded = self
            .platform
            .upload_file(
                channel_id,
                FileUpload {
                    filename,
                    content: message.content.clone(),
                    data,
                },
            )
            .await?;

        if let Err(e) = self.platform.delete_message(channel_id, message.id).await {
            tracing::warn!(
                message_id = %message.id,
                error = %e,
                "Failed to delete original sound message after re-upload"
            );
        }
        Ok(uploaded)
    }

    /// 确保消息由机器人发出；否则重新上传并修补目录
    pub async fn ensure_bot_owned(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<ChatMessage, ApplicationError> {
        let message = self.platform.fetch_message(channel_id, message_id).await?;
        let bot_user_id = self.bot_user_id().await?;
        if message.author_id == bot_user_id {
            return Ok(message);
        }

        let name = message
            .single_attachment()
            .and_then(|a| clip_name(&a.filename, &self.media_extension))
            .ok_or_else(|| ApplicationError::validation(format!("message {} is not a sound", message_id)))?;

        let uploaded = self
            .reupload(channel_id, &message, file_name_for(&name, &self.media_extension))
            .await?;

        // 只有目录中该名称仍指向原消息时才修补
        if let Some(current) = self.store.find_sound(guild_id, &name)? {
            if current.message_id == message_id {
                let url = uploaded
                    .single_attachment()
                    .map(|a| a.url.clone())
                    .unwrap_or(current.url.clone());
                let replacement = Sound::new(uploaded.id, url).with_volume(current.volume);
                self.store.replace_sound(guild_id, &name, replacement)?;
            }
        }

        tracing::info!(
            guild_id = %guild_id,
            sound = %name,
            old_message_id = %message_id,
            new_message_id = %uploaded.id,
            "Sound re-uploaded under bot ownership"
        );
        Ok(uploaded)
    }

    /// 改写消息正文中的标签
    ///
    /// 格式错误的片段无法保留，改写时丢弃并记录
    pub async fn rewrite_tags(
        &self,
        channel_id: ChannelId,
        message: &ChatMessage,
        edit: impl FnOnce(Vec<Tag>) -> Vec<Tag>,
    ) -> Result<ChatMessage, ApplicationError> {
        let (current, errors) = tags::decode_lenient(&message.content);
        for error in &errors {
            tracing::warn!(message_id = %message.id, error = %error, "Dropping malformed tag on rewrite");
        }
        let content = tags::encode(&edit(current));
        if content == message.content {
            return Ok(message.clone());
        }
        let edited = self
            .platform
            .edit_message_content(channel_id, message.id, &content)
            .await?;
        Ok(edited)
    }
}
