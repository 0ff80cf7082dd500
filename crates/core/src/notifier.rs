use anyhow::Result;
use async_trait::async_trait;

use crate::models::{MessageId, RenderedMessage};

/// Outbound chat capability.
///
/// Implementations must serialize requests that target the same channel;
/// the platform rejects or reorders concurrent edits to one message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, channel: &str, text: &str) -> Result<MessageId>;

    async fn send_embed(&self, channel: &str, message: &RenderedMessage) -> Result<MessageId>;

    async fn edit_embed(
        &self,
        channel: &str,
        message_id: &str,
        message: &RenderedMessage,
    ) -> Result<()>;

    /// Most recent message IDs in the channel, newest first.
    async fn recent_message_ids(&self, channel: &str) -> Result<Vec<MessageId>>;

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<()>;
}

#[cfg(any(test, feature = "test-util"))]
pub use recording::{Call, RecordingNotifier};

#[cfg(any(test, feature = "test-util"))]
mod recording {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    };

    use anyhow::{Result, bail};
    use async_trait::async_trait;

    use super::Notifier;
    use crate::models::{MessageId, RenderedMessage};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Text { channel: String, text: String },
        Embed { channel: String, message: RenderedMessage },
        Edit { channel: String, message_id: String, message: RenderedMessage },
        Delete { channel: String, message_id: String },
    }

    /// In-memory notifier that records every call.
    #[derive(Default)]
    pub struct RecordingNotifier {
        calls: Mutex<Vec<Call>>,
        recent: Mutex<Vec<MessageId>>,
        next_id: AtomicU64,
        failing: AtomicBool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self { Self::default() }

        /// Seed the IDs returned by `recent_message_ids`.
        pub fn with_recent(self, ids: &[&str]) -> Self {
            *self.recent.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
            self
        }

        /// Make every subsequent call fail.
        pub fn set_failing(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst) }

        pub fn calls(&self) -> Vec<Call> { self.calls.lock().unwrap().clone() }

        pub fn texts_to(&self, channel: &str) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Text { channel: ch, text } if ch == channel => Some(text),
                    _ => None,
                })
                .collect()
        }

        pub fn embeds_to(&self, channel: &str) -> Vec<RenderedMessage> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Embed { channel: ch, message } if ch == channel => Some(message),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call) -> Result<MessageId> {
            if self.failing.load(Ordering::SeqCst) {
                bail!("notifier offline");
            }
            self.calls.lock().unwrap().push(call);
            Ok(format!("{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_text(&self, channel: &str, text: &str) -> Result<MessageId> {
            self.record(Call::Text { channel: channel.into(), text: text.into() })
        }

        async fn send_embed(&self, channel: &str, message: &RenderedMessage) -> Result<MessageId> {
            self.record(Call::Embed { channel: channel.into(), message: message.clone() })
        }

        async fn edit_embed(
            &self,
            channel: &str,
            message_id: &str,
            message: &RenderedMessage,
        ) -> Result<()> {
            self.record(Call::Edit {
                channel: channel.into(),
                message_id: message_id.into(),
                message: message.clone(),
            })
            .map(|_| ())
        }

        async fn recent_message_ids(&self, _channel: &str) -> Result<Vec<MessageId>> {
            if self.failing.load(Ordering::SeqCst) {
                bail!("notifier offline");
            }
            Ok(self.recent.lock().unwrap().clone())
        }

        async fn delete_message(&self, channel: &str, message_id: &str) -> Result<()> {
            self.record(Call::Delete { channel: channel.into(), message_id: message_id.into() })
                .map(|_| ())
        }
    }
}
