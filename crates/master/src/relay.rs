use std::sync::Arc;

use eveleve_core::{config::DiscordConfig, models::RenderedMessage, notifier::Notifier};
use eveleve_github::RepoEvent;
use eveleve_render::{render_build, render_repo_event, split_message};
use eveleve_travis::BuildEvent;

/// Sent in place of a chunk that is a single blank line.
const BLANK_LINE: &str = "\u{200b}";

/// Delivers rendered events and replies to the chat channels.
///
/// Every send is attempted once; failures are logged and dropped.
pub struct Relay {
    notifier: Arc<dyn Notifier>,
    event_channel: String,
}

impl Relay {
    pub fn new(notifier: Arc<dyn Notifier>, discord: &DiscordConfig) -> Self {
        Self {
            notifier,
            event_channel: discord.event_channel.clone(),
        }
    }

    pub async fn build(&self, build: &BuildEvent) {
        tracing::info!(
            "New Travis CI event: build #{} of {} {}",
            build.number,
            build.repository.slug(),
            build.state
        );
        self.send_embed(&render_build(build)).await;
    }

    pub async fn repo_event(&self, event: &RepoEvent) {
        let name = event.full_name().unwrap_or_default();
        match render_repo_event(event) {
            Some(msg) => {
                tracing::info!("New {} event from {name}", event.kind());
                self.send_embed(&msg).await;
            }
            None => tracing::debug!("Not announcing {} event from {name}", event.kind()),
        }
    }

    /// Post plain text, split into chunks under the message ceiling.
    pub async fn send_text(&self, channel: &str, text: &str) {
        if text.is_empty() {
            return;
        }
        for chunk in split_message(text) {
            // Chat rejects empty messages; keep the blank line visible
            let chunk = if chunk.is_empty() { BLANK_LINE.to_string() } else { chunk };
            if let Err(e) = self.notifier.send_text(channel, &chunk).await {
                tracing::error!("Failed to send message to {channel}: {e:#}");
            }
        }
    }

    async fn send_embed(&self, msg: &RenderedMessage) {
        if let Err(e) = self.notifier.send_embed(&self.event_channel, msg).await {
            tracing::error!("Failed to send notification: {e:#}");
        }
    }
}
