use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use eveleve_core::{models::Command, stream::EventSender};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    client::DiscordClient,
    models::{Message, snowflake},
};

pub const COMMAND_PREFIX: char = '!';

/// Messages fetched per poll.
const POLL_LIMIT: usize = 50;

/// Parse a chat message into a command when it starts with the prefix.
pub fn parse_command(content: &str, channel: Option<&str>) -> Option<Command> {
    let mut words = content.split_whitespace();
    let verb = words.next()?;
    if !verb.starts_with(COMMAND_PREFIX) || verb.len() == COMMAND_PREFIX.len_utf8() {
        return None;
    }
    Some(Command {
        verb: verb.to_string(),
        args: words.map(str::to_string).collect(),
        channel: channel.map(str::to_string),
    })
}

/// Where chat messages are read from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Messages newer than `after`, in any order; the newest messages when `after` is `None`.
    async fn messages_after(&self, channel: &str, after: Option<&str>) -> Result<Vec<Message>>;
}

#[async_trait]
impl MessageSource for DiscordClient {
    async fn messages_after(&self, channel: &str, after: Option<&str>) -> Result<Vec<Message>> {
        self.messages(channel, after, POLL_LIMIT).await
    }
}

/// Polls a channel and feeds prefixed messages into the command stream.
pub struct CommandPoller {
    source: Arc<dyn MessageSource>,
    channel: String,
    interval: Duration,
    last_seen: Option<String>,
    primed: bool,
}

impl CommandPoller {
    pub fn new(source: Arc<dyn MessageSource>, channel: impl Into<String>, interval: Duration) -> Self {
        Self { source, channel: channel.into(), interval, last_seen: None, primed: false }
    }

    /// Mark everything already in the channel as seen, so history is not
    /// replayed as commands.
    pub async fn prime(&mut self) -> Result<()> {
        let messages = self.source.messages_after(&self.channel, None).await?;
        self.last_seen = messages.into_iter().map(|m| m.id).max_by_key(|id| snowflake(id));
        self.primed = true;
        tracing::info!("Listening for commands in {}", self.channel);
        Ok(())
    }

    /// Fetch new commands, oldest first. Until the channel has been primed
    /// this primes it instead and returns nothing.
    pub async fn poll(&mut self) -> Result<Vec<Command>> {
        if !self.primed {
            self.prime().await?;
            return Ok(Vec::new());
        }
        let mut messages =
            self.source.messages_after(&self.channel, self.last_seen.as_deref()).await?;
        messages.sort_by_key(|m| snowflake(&m.id));
        if let Some(last) = messages.last() {
            self.last_seen = Some(last.id.clone());
        }
        Ok(messages
            .into_iter()
            .filter(|m| !m.author.bot)
            .filter_map(|m| parse_command(&m.content, Some(&m.channel_id)))
            .collect())
    }

    pub async fn run(mut self, commands: EventSender<Command>, shutdown: CancellationToken) {
        if let Err(e) = self.prime().await {
            tracing::warn!("Failed to read command channel {}: {e:#}", self.channel);
        }
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.poll() => polled,
            };
            let batch = match polled {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!("Failed to poll commands: {e:#}");
                    continue;
                }
            };
            for command in batch {
                tracing::info!("Received command {} {:?}", command.verb, command.args);
                let sent = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    sent = commands.send(command) => sent,
                };
                if sent.is_err() {
                    tracing::info!("Command stream closed");
                    return;
                }
            }
        }
        tracing::info!("Command poller stopped");
    }
}
