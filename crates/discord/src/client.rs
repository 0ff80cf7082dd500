use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use eveleve_core::{
    config::DiscordConfig,
    models::{MessageId, RenderedMessage},
    notifier::Notifier,
};
use reqwest::{
    Method, RequestBuilder,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::{CreateMessage, EditMessage, Message, User};

/// Number of messages returned by `recent_message_ids`.
pub const RECENT_LIMIT: usize = 10;

/// Discord REST client.
///
/// Requests to one channel are serialized; different channels proceed in
/// parallel.
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    channels: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {}", config.token))
            .context("Invalid Discord token")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        let http = reqwest::Client::builder()
            .user_agent(concat!("eveleve/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Verify the token by fetching the bot user.
    pub async fn connect(&self) -> Result<User> {
        let user: User = self
            .request(Method::GET, "/users/@me")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Failed to retrieve user data")?
            .json()
            .await
            .context("Failed to parse user data")?;
        tracing::info!("Connected to Discord as {}", user.username);
        Ok(user)
    }

    /// Messages in `channel`, newest first. With `after`, only messages
    /// newer than that ID are returned.
    pub async fn messages(
        &self,
        channel: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let mut path = format!("/channels/{channel}/messages?limit={limit}");
        if let Some(after) = after {
            path.push_str(&format!("&after={after}"));
        }
        let _guard = self.lock(channel).await;
        self.request(Method::GET, &path)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to list messages in {channel}"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse messages in {channel}"))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.api_base))
    }

    async fn lock(&self, channel: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            channels.entry(channel.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn create(&self, channel: &str, body: &CreateMessage<'_>) -> Result<MessageId> {
        let _guard = self.lock(channel).await;
        let message: Message = self
            .request(Method::POST, &format!("/channels/{channel}/messages"))
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to send message to {channel}"))?
            .json()
            .await
            .context("Failed to parse created message")?;
        Ok(message.id)
    }
}

#[async_trait]
impl Notifier for DiscordClient {
    async fn send_text(&self, channel: &str, text: &str) -> Result<MessageId> {
        tracing::debug!("Sending message to {channel}");
        self.create(channel, &CreateMessage { content: Some(text), ..Default::default() }).await
    }

    async fn send_embed(&self, channel: &str, message: &RenderedMessage) -> Result<MessageId> {
        tracing::debug!("Sending embed {:?} to {channel}", message.title);
        self.create(channel, &CreateMessage { content: None, embeds: std::slice::from_ref(message) })
            .await
    }

    async fn edit_embed(
        &self,
        channel: &str,
        message_id: &str,
        message: &RenderedMessage,
    ) -> Result<()> {
        let _guard = self.lock(channel).await;
        self.request(Method::PATCH, &format!("/channels/{channel}/messages/{message_id}"))
            .json(&EditMessage { embeds: std::slice::from_ref(message) })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to edit message {message_id} in {channel}"))?;
        Ok(())
    }

    async fn recent_message_ids(&self, channel: &str) -> Result<Vec<MessageId>> {
        let messages = self.messages(channel, None, RECENT_LIMIT).await?;
        Ok(messages.into_iter().map(|m| m.id).collect())
    }

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<()> {
        if message_id.is_empty() {
            return Err(anyhow!("Empty message ID"));
        }
        let _guard = self.lock(channel).await;
        self.request(Method::DELETE, &format!("/channels/{channel}/messages/{message_id}"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to delete message {message_id} in {channel}"))?;
        Ok(())
    }
}
