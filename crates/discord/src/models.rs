//! Discord REST API payloads.

use eveleve_core::models::{MessageId, RenderedMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// Body of `POST /channels/{channel}/messages`.
#[derive(Debug, Default, Serialize)]
pub struct CreateMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<&'a str>,
    #[serde(skip_serializing_if = "no_embeds")]
    pub embeds: &'a [RenderedMessage],
}

fn no_embeds(embeds: &&[RenderedMessage]) -> bool { embeds.is_empty() }

/// Body of `PATCH /channels/{channel}/messages/{message}`.
#[derive(Debug, Serialize)]
pub struct EditMessage<'a> {
    pub embeds: &'a [RenderedMessage],
}

/// Orders snowflake IDs numerically; IDs that fail to parse sort first.
pub fn snowflake(id: &str) -> u64 { id.parse().unwrap_or(0) }
