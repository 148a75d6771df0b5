//! Sound Catalog - 音效目录与入场音绑定的构建

use std::collections::HashMap;

use super::{parse_sound_message, IndexIssue, Sound};
use crate::domain::ids::{MessageId, UserId};
use crate::domain::message::ChatMessage;

/// 名称 → 音效
pub type SoundCatalog = HashMap<String, Sound>;

/// 用户 → 入场音
pub type EntranceBindings = HashMap<UserId, Sound>;

/// 一次完整扫描的结果
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub catalog: SoundCatalog,
    pub entrances: EntranceBindings,
    pub scanned_messages: usize,
    pub issues: Vec<IndexIssue>,
}

/// 目录构建器
///
/// 合并策略：同名音效以消息 ID 较大（较新）者为准；
/// 同一用户被多条消息标记为入场音时同样保留最新消息的绑定。
/// 结果与消息输入顺序无关。
pub struct CatalogBuilder {
    accepted_extension: String,
    catalog: SoundCatalog,
    entrances: EntranceBindings,
    scanned_messages: usize,
    issues: Vec<IndexIssue>,
}

impl CatalogBuilder {
    pub fn new(accepted_extension: impl Into<String>) -> Self {
        Self {
            accepted_extension: accepted_extension.into(),
            catalog: SoundCatalog::new(),
            entrances: EntranceBindings::new(),
            scanned_messages: 0,
            issues: Vec::new(),
        }
    }

    /// 处理一条历史消息
    pub fn ingest(&mut self, message: &ChatMessage) {
        self.scanned_messages += 1;

        let Some(parsed) = parse_sound_message(message, &self.accepted_extension) else {
            return;
        };
        self.issues.extend(parsed.issues);

        for user_id in parsed.entrance_users {
            self.bind_entrance(user_id, parsed.sound.clone());
        }

        match self.catalog.get(&parsed.name) {
            Some(existing) if existing.message_id > parsed.sound.message_id => {}
            _ => {
                self.catalog.insert(parsed.name, parsed.sound);
            }
        }
    }

    pub fn ingest_all<'a>(&mut self, messages: impl IntoIterator<Item = &'a ChatMessage>) {
        for message in messages {
            self.ingest(message);
        }
    }

    pub fn finish(self) -> CatalogSnapshot {
        CatalogSnapshot {
            catalog: self.catalog,
            entrances: self.entrances,
            scanned_messages: self.scanned_messages,
            issues: self.issues,
        }
    }

    fn bind_entrance(&mut self, user_id: UserId, sound: Sound) {
        let Some(existing) = self.entrances.get(&user_id) else {
            self.entrances.insert(user_id, sound);
            return;
        };
        if existing.message_id == sound.message_id {
            return;
        }

        let (kept, dropped): (MessageId, MessageId) = if sound.message_id > existing.message_id {
            (sound.message_id, existing.message_id)
        } else {
            (existing.message_id, sound.message_id)
        };
        self.issues.push(IndexIssue::DuplicateEntrance {
            user_id,
            kept,
            dropped,
        });
        if kept == sound.message_id {
            self.entrances.insert(user_id, sound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{ChannelId, UserId};
    use crate::domain::message::Attachment;

    fn message(id: u64, filename: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(id),
            channel_id: ChannelId::new(1),
            guild_id: None,
            author_id: UserId::new(99),
            author_is_bot: false,
            content: content.to_string(),
            attachments: vec![Attachment {
                filename: filename.to_string(),
                url: format!("https://cdn.example/{}/{}", id, filename),
            }],
        }
    }

    #[test]
    fn test_newest_message_wins_regardless_of_order() {
        let older = message(10, "horn.mp3", "");
        let newer = message(20, "horn.mp3", "v:300;");

        for order in [vec![&newer, &older], vec![&older, &newer]] {
            let mut builder = CatalogBuilder::new("mp3");
            builder.ingest_all(order);
            let snapshot = builder.finish();
            assert_eq!(snapshot.catalog.len(), 1);
            let horn = &snapshot.catalog["horn"];
            assert_eq!(horn.message_id, MessageId::new(20));
            assert_eq!(horn.volume.value(), 300);
        }
    }

    #[test]
    fn test_skips_non_matching_messages() {
        let mut text_only = message(1, "x.mp3", "");
        text_only.attachments.clear();
        let mut two_files = message(2, "a.mp3", "");
        two_files.attachments.push(Attachment {
            filename: "b.mp3".to_string(),
            url: "u".to_string(),
        });
        let wav = message(3, "c.wav", "");

        let mut builder = CatalogBuilder::new("mp3");
        builder.ingest_all([&text_only, &two_files, &wav]);
        let snapshot = builder.finish();
        assert!(snapshot.catalog.is_empty());
        assert_eq!(snapshot.scanned_messages, 3);
    }

    #[test]
    fn test_entrance_and_volume_tags() {
        let mut builder = CatalogBuilder::new("mp3");
        builder.ingest(&message(5, "horn.mp3", "e:42;v:128;"));
        let snapshot = builder.finish();

        let entrance = &snapshot.entrances[&UserId::new(42)];
        assert_eq!(entrance.message_id, MessageId::new(5));
        assert_eq!(entrance.volume.value(), 128);
    }

    #[test]
    fn test_duplicate_entrance_keeps_newest_and_reports() {
        let mut builder = CatalogBuilder::new("mp3");
        builder.ingest(&message(30, "air.mp3", "e:42;"));
        builder.ingest(&message(10, "horn.mp3", "e:42;"));
        let snapshot = builder.finish();

        assert_eq!(snapshot.entrances[&UserId::new(42)].message_id, MessageId::new(30));
        assert!(snapshot.issues.contains(&IndexIssue::DuplicateEntrance {
            user_id: UserId::new(42),
            kept: MessageId::new(30),
            dropped: MessageId::new(10),
        }));
    }

    #[test]
    fn test_malformed_tags_are_skipped() {
        let mut builder = CatalogBuilder::new("mp3");
        builder.ingest(&message(5, "horn.mp3", "nice sound;v:loud;e:42;"));
        let snapshot = builder.finish();

        assert!(snapshot.catalog["horn"].volume.is_unspecified());
        assert!(snapshot.entrances.contains_key(&UserId::new(42)));
        assert_eq!(snapshot.issues.len(), 2);
    }
}
