//! HTTP Platform Client - 调用聊天平台 REST API
//!
//! 实现 ChatPlatformPort trait，REST v10 风格接口：
//! - GET    /users/@me
//! - GET    /guilds/{guild}/channels
//! - GET    /channels/{channel}/messages?limit=&before=
//! - POST   /channels/{channel}/messages            (JSON 或 multipart 上传)
//! - PATCH  /channels/{channel}/messages/{message}
//! - DELETE /channels/{channel}/messages/{message}
//!
//! 429 / 5xx / 超时按指数退避有限次重试；语音在线状态读自 GatewayCache

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::gateway_cache::GatewayCache;
use crate::application::ports::{
    ChannelInfo, ChannelKind, ChatPlatformPort, FileUpload, PlatformError, VoiceOccupant,
};
use crate::domain::{Attachment, ChannelId, ChatMessage, GuildId, MessageId, UserId};

/// 平台 REST 客户端配置
#[derive(Debug, Clone)]
pub struct HttpPlatformClientConfig {
    /// API 基础 URL
    pub api_base_url: String,
    /// 机器人 token
    pub token: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 重试次数
    pub max_retries: u32,
    /// 首次重试等待，之后每次翻倍
    pub retry_base_delay_ms: u64,
}

impl Default for HttpPlatformClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://discord.com/api/v10".to_string(),
            token: String::new(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl HttpPlatformClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// 第 `attempt` 次失败后的等待时间
    fn backoff(&self, attempt: u32, error: &PlatformError) -> Duration {
        match error {
            PlatformError::RateLimited { retry_after_ms } => Duration::from_millis(*retry_after_ms),
            _ => Duration::from_millis(self.retry_base_delay_ms.saturating_mul(1 << attempt.min(10))),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireUser {
    id: UserId,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    filename: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: MessageId,
    channel_id: ChannelId,
    #[serde(default)]
    guild_id: Option<GuildId>,
    author: WireUser,
    #[serde(default)]
    content: String,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
}

impl From<WireMessage> for ChatMessage {
    fn from(m: WireMessage) -> Self {
        Self {
            id: m.id,
            channel_id: m.channel_id,
            guild_id: m.guild_id,
            author_id: m.author.id,
            author_is_bot: m.author.bot,
            content: m.content,
            attachments: m
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    filename: a.filename,
                    url: a.url,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: ChannelId,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
}

fn channel_kind(raw: u8) -> ChannelKind {
    match raw {
        0 => ChannelKind::Text,
        2 | 13 => ChannelKind::Voice,
        _ => ChannelKind::Other,
    }
}

#[derive(Debug, Serialize)]
struct MessageReference {
    message_id: MessageId,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_reference: Option<MessageReference>,
}

#[derive(Debug, Serialize)]
struct EditMessage<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

// ============================================================================
// Client
// ============================================================================

/// 平台 REST 客户端
pub struct HttpPlatformClient {
    client: Client,
    config: HttpPlatformClientConfig,
    gateway: Arc<GatewayCache>,
}

impl HttpPlatformClient {
    pub fn new(config: HttpPlatformClientConfig, gateway: Arc<GatewayCache>) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            gateway,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(
            reqwest::header::AUTHORIZATION,
            format!("Bot {}", self.config.token),
        )
    }

    /// 发送请求，瞬时失败时按退避重试
    ///
    /// `build` 每次尝试重新构造请求（multipart 表单不可复用）
    async fn execute<F>(&self, build: F) -> Result<Response, PlatformError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let result = match build().send().await {
                Ok(response) => classify(response).await,
                Err(e) => Err(map_reqwest_error(e)),
            };

            match result {
                Err(error) if error.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff(attempt, &error);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Platform request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn execute_json<T, F>(&self, build: F) -> Result<T, PlatformError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let response = self.execute(build).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
    }

    async fn create_message(
        &self,
        channel_id: ChannelId,
        content: &str,
        reply_to: Option<MessageId>,
    ) -> Result<ChatMessage, PlatformError> {
        let url = self.url(&format!("/channels/{}/messages", channel_id));
        let message: WireMessage = self
            .execute_json(|| {
                self.authorized(self.client.post(&url)).json(&CreateMessage {
                    content,
                    message_reference: reply_to.map(|message_id| MessageReference { message_id }),
                })
            })
            .await?;
        Ok(message.into())
    }
}

/// 把非成功状态码映射为 PlatformError
async fn classify(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let header_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok());
        let body_secs = response
            .json::<RateLimitBody>()
            .await
            .ok()
            .map(|b| b.retry_after);
        let secs = body_secs.or(header_secs).unwrap_or(1.0);
        return Err(PlatformError::RateLimited {
            retry_after_ms: (secs * 1000.0).ceil() as u64,
        });
    }

    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => PlatformError::NotFound(message),
        s if s.is_server_error() => PlatformError::Transient(format!("HTTP {}: {}", s, message)),
        s => PlatformError::Rejected {
            status: s.as_u16(),
            message,
        },
    })
}

fn map_reqwest_error(e: reqwest::Error) -> PlatformError {
    if e.is_timeout() {
        PlatformError::Transient(format!("Request timed out: {}", e))
    } else if e.is_connect() {
        PlatformError::Network(format!("Cannot connect to platform: {}", e))
    } else {
        PlatformError::Network(e.to_string())
    }
}

#[async_trait]
impl ChatPlatformPort for HttpPlatformClient {
    async fn current_user(&self) -> Result<UserId, PlatformError> {
        let url = self.url("/users/@me");
        let user: WireUser = self
            .execute_json(|| self.authorized(self.client.get(&url)))
            .await?;
        Ok(user.id)
    }

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<ChannelInfo>, PlatformError> {
        let url = self.url(&format!("/guilds/{}/channels", guild_id));
        let channels: Vec<WireChannel> = self
            .execute_json(|| self.authorized(self.client.get(&url)))
            .await?;

        Ok(channels
            .into_iter()
            .map(|c| ChannelInfo {
                id: c.id,
                guild_id,
                name: c.name.unwrap_or_default(),
                kind: channel_kind(c.kind),
            })
            .collect())
    }

    async fn list_voice_states(&self, guild_id: GuildId) -> Result<Vec<VoiceOccupant>, PlatformError> {
        Ok(self.gateway.occupants(guild_id))
    }

    async fn fetch_messages_page(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PlatformError> {
        let url = self.url(&format!("/channels/{}/messages", channel_id));
        let mut query = vec![("limit", limit.clamp(1, 100).to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }

        let messages: Vec<WireMessage> = self
            .execute_json(|| self.authorized(self.client.get(&url)).query(&query))
            .await?;

        tracing::debug!(
            channel_id = %channel_id,
            before = ?before.map(|b| b.get()),
            count = messages.len(),
            "Fetched message page"
        );
        Ok(messages.into_iter().map(ChatMessage::from).collect())
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<ChatMessage, PlatformError> {
        let url = self.url(&format!("/channels/{}/messages/{}", channel_id, message_id));
        let message: WireMessage = self
            .execute_json(|| self.authorized(self.client.get(&url)))
            .await?;
        Ok(message.into())
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<ChatMessage, PlatformError> {
        self.create_message(channel_id, content, None).await
    }

    async fn reply(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<ChatMessage, PlatformError> {
        self.create_message(channel_id, content, Some(message_id)).await
    }

    async fn edit_message_content(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<ChatMessage, PlatformError> {
        let url = self.url(&format!("/channels/{}/messages/{}", channel_id, message_id));
        let message: WireMessage = self
            .execute_json(|| self.authorized(self.client.patch(&url)).json(&EditMessage { content }))
            .await?;
        Ok(message.into())
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{}/messages/{}", channel_id, message_id));
        self.execute(|| self.authorized(self.client.delete(&url)))
            .await?;
        Ok(())
    }

    async fn upload_file(&self, channel_id: ChannelId, file: FileUpload) -> Result<ChatMessage, PlatformError> {
        let url = self.url(&format!("/channels/{}/messages", channel_id));
        let payload = serde_json::to_string(&CreateMessage {
            content: &file.content,
            message_reference: None,
        })
        .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            channel_id = %channel_id,
            filename = %file.filename,
            size = file.data.len(),
            "Uploading file"
        );

        let message: WireMessage = self
            .execute_json(|| {
                let part = Part::bytes(file.data.clone()).file_name(file.filename.clone());
                let form = Form::new()
                    .text("payload_json", payload.clone())
                    .part("files[0]", part);
                self.authorized(self.client.post(&url)).multipart(form)
            })
            .await?;
        Ok(message.into())
    }

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, PlatformError> {
        let response = self.execute(|| self.client.get(url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlatformError::InvalidResponse(format!("Failed to read attachment: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
