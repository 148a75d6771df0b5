//! Fake Chat Platform - 用于测试的内存平台
//!
//! 保存频道、消息与语音在线状态，并记录所有写操作

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use crate::application::ports::{
    ChannelInfo, ChannelKind, ChatPlatformPort, FileUpload, PlatformError, VoiceOccupant,
};
use crate::domain::{Attachment, ChannelId, ChatMessage, GuildId, MessageId, UserId};

#[derive(Default)]
struct FakePlatformState {
    channels: HashMap<GuildId, Vec<ChannelInfo>>,
    messages: HashMap<ChannelId, BTreeMap<MessageId, ChatMessage>>,
    voice_states: HashMap<GuildId, Vec<VoiceOccupant>>,
    next_id: u64,
    deleted: Vec<MessageId>,
    replies: Vec<(MessageId, String)>,
    page_requests: Vec<(ChannelId, Option<MessageId>)>,
    page_failures: VecDeque<PlatformError>,
    current_user_calls: usize,
}

/// Fake Chat Platform
pub struct FakePlatform {
    bot_user_id: UserId,
    state: Mutex<FakePlatformState>,
}

impl FakePlatform {
    pub fn new(bot_user_id: UserId) -> Self {
        Self {
            bot_user_id,
            state: Mutex::new(FakePlatformState {
                next_id: 1_000_000,
                ..Default::default()
            }),
        }
    }

    pub fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakePlatformState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_channel(&self, guild_id: GuildId, channel_id: ChannelId, name: &str, kind: ChannelKind) {
        self.lock().channels.entry(guild_id).or_default().push(ChannelInfo {
            id: channel_id,
            guild_id,
            name: name.to_string(),
            kind,
        });
    }

    /// 预置一条历史消息
    pub fn add_message(&self, message: ChatMessage) {
        let mut state = self.lock();
        state.next_id = state.next_id.max(message.id.get() + 1);
        state
            .messages
            .entry(message.channel_id)
            .or_default()
            .insert(message.id, message);
    }

    /// 预置一条带单个附件的音效消息
    pub fn add_sound_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        author_id: UserId,
        filename: &str,
        content: &str,
    ) {
        self.add_message(ChatMessage {
            id: message_id,
            channel_id,
            guild_id: None,
            author_id,
            author_is_bot: author_id == self.bot_user_id,
            content: content.to_string(),
            attachments: vec![Attachment {
                filename: filename.to_string(),
                url: attachment_url(message_id, filename),
            }],
        });
    }

    pub fn set_voice_states(&self, guild_id: GuildId, occupants: Vec<VoiceOccupant>) {
        self.lock().voice_states.insert(guild_id, occupants);
    }

    /// 下一次分页请求返回该错误
    pub fn fail_next_page(&self, error: PlatformError) {
        self.lock().page_failures.push_back(error);
    }

    pub fn message(&self, channel_id: ChannelId, message_id: MessageId) -> Option<ChatMessage> {
        self.lock()
            .messages
            .get(&channel_id)
            .and_then(|m| m.get(&message_id))
            .cloned()
    }

    /// 频道内所有消息，旧到新
    pub fn messages(&self, channel_id: ChannelId) -> Vec<ChatMessage> {
        self.lock()
            .messages
            .get(&channel_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.lock().deleted.clone()
    }

    pub fn replies(&self) -> Vec<(MessageId, String)> {
        self.lock().replies.clone()
    }

    pub fn current_user_calls(&self) -> usize {
        self.lock().current_user_calls
    }

    pub fn page_requests(&self) -> Vec<(ChannelId, Option<MessageId>)> {
        self.lock().page_requests.clone()
    }

    fn create_message(
        &self,
        state: &mut FakePlatformState,
        channel_id: ChannelId,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> ChatMessage {
        let id = MessageId::new(state.next_id);
        state.next_id += 1;
        let message = ChatMessage {
            id,
            channel_id,
            guild_id: None,
            author_id: self.bot_user_id,
            author_is_bot: true,
            content: content.to_string(),
            attachments,
        };
        state
            .messages
            .entry(channel_id)
            .or_default()
            .insert(id, message.clone());
        message
    }
}

fn attachment_url(message_id: MessageId, filename: &str) -> String {
    format!("https://cdn.fake/{}/{}", message_id, filename)
}

fn not_found(channel_id: ChannelId, message_id: MessageId) -> PlatformError {
    PlatformError::NotFound(format!("message {}/{}", channel_id, message_id))
}

#[async_trait]
impl ChatPlatformPort for FakePlatform {
    async fn current_user(&self) -> Result<UserId, PlatformError> {
        self.lock().current_user_calls += 1;
        Ok(self.bot_user_id)
    }

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<ChannelInfo>, PlatformError> {
        Ok(self.lock().channels.get(&guild_id).cloned().unwrap_or_default())
    }

    async fn list_voice_states(&self, guild_id: GuildId) -> Result<Vec<VoiceOccupant>, PlatformError> {
        Ok(self.lock().voice_states.get(&guild_id).cloned().unwrap_or_default())
    }

    async fn fetch_messages_page(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PlatformError> {
        let mut state = self.lock();
        state.page_requests.push((channel_id, before));
        if let Some(error) = state.page_failures.pop_front() {
            return Err(error);
        }
        let Some(messages) = state.messages.get(&channel_id) else {
            return Ok(Vec::new());
        };
        let page: Vec<ChatMessage> = match before {
            Some(cursor) => messages.range(..cursor).rev().take(limit).map(|(_, m)| m.clone()).collect(),
            None => messages.values().rev().take(limit).cloned().collect(),
        };
        Ok(page)
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<ChatMessage, PlatformError> {
        self.message(channel_id, message_id)
            .ok_or_else(|| not_found(channel_id, message_id))
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<ChatMessage, PlatformError> {
        let mut state = self.lock();
        Ok(self.create_message(&mut state, channel_id, content, Vec::new()))
    }

    async fn reply(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<ChatMessage, PlatformError> {
        let mut state = self.lock();
        state.replies.push((message_id, content.to_string()));
        Ok(self.create_message(&mut state, channel_id, content, Vec::new()))
    }

    async fn edit_message_content(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<ChatMessage, PlatformError> {
        let bot_user_id = self.bot_user_id;
        let mut state = self.lock();
        let message = state
            .messages
            .get_mut(&channel_id)
            .and_then(|m| m.get_mut(&message_id))
            .ok_or_else(|| not_found(channel_id, message_id))?;
        if message.author_id != bot_user_id {
            return Err(PlatformError::Rejected {
                status: 403,
                message: "Cannot edit a message authored by another user".to_string(),
            });
        }
        message.content = content.to_string();
        Ok(message.clone())
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), PlatformError> {
        let mut state = self.lock();
        state
            .messages
            .get_mut(&channel_id)
            .and_then(|m| m.remove(&message_id))
            .ok_or_else(|| not_found(channel_id, message_id))?;
        state.deleted.push(message_id);
        Ok(())
    }

    async fn upload_file(&self, channel_id: ChannelId, file: FileUpload) -> Result<ChatMessage, PlatformError> {
        let mut state = self.lock();
        let id = MessageId::new(state.next_id);
        let attachment = Attachment {
            filename: file.filename.clone(),
            url: attachment_url(id, &file.filename),
        };
        Ok(self.create_message(&mut state, channel_id, &file.content, vec![attachment]))
    }

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, PlatformError> {
        Ok(url.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL: ChannelId = ChannelId::new(5);

    #[tokio::test]
    async fn test_pages_are_newest_first_with_cursor() {
        let platform = FakePlatform::new(UserId::new(1));
        for id in 1..=5 {
            platform.add_sound_message(CHANNEL, MessageId::new(id), UserId::new(2), "a.mp3", "");
        }

        let first = platform.fetch_messages_page(CHANNEL, None, 2).await.unwrap();
        assert_eq!(first.iter().map(|m| m.id.get()).collect::<Vec<_>>(), vec![5, 4]);

        let second = platform
            .fetch_messages_page(CHANNEL, Some(MessageId::new(4)), 2)
            .await
            .unwrap();
        assert_eq!(second.iter().map(|m| m.id.get()).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[tokio::test]
    async fn test_only_own_messages_are_editable() {
        let platform = FakePlatform::new(UserId::new(1));
        platform.add_sound_message(CHANNEL, MessageId::new(1), UserId::new(2), "a.mp3", "");
        let result = platform.edit_message_content(CHANNEL, MessageId::new(1), "v:1;").await;
        assert!(matches!(result, Err(PlatformError::Rejected { status: 403, .. })));
    }
}
