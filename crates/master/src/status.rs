use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use eveleve_core::{
    models::{Author, MessageId, RenderedMessage},
    notifier::Notifier,
    util::format_uptime,
};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

const WATCHDOG_ICON: &str = "https://savageking.io/img/savage-king-games.png";
const WATCHDOG_URL: &str = "https://savageking.io";

/// The uptime embed kept at the top of the status channel.
pub struct StatusBoard {
    notifier: Arc<dyn Notifier>,
    channel: String,
    started: Instant,
    message: Mutex<Option<MessageId>>,
}

impl StatusBoard {
    pub fn new(notifier: Arc<dyn Notifier>, channel: impl Into<String>, started: Instant) -> Self {
        Self { notifier, channel: channel.into(), started, message: Mutex::new(None) }
    }

    /// Delete the recent messages left in the channel by earlier runs.
    pub async fn clear(&self) -> Result<()> {
        let ids = self.notifier.recent_message_ids(&self.channel).await?;
        for id in ids.iter().filter(|id| !id.is_empty()) {
            if let Err(e) = self.notifier.delete_message(&self.channel, id).await {
                tracing::warn!("Failed to delete status message {id}: {e:#}");
            }
        }
        Ok(())
    }

    pub fn render(&self, uptime: Duration) -> RenderedMessage {
        let mut msg = RenderedMessage {
            title: "Status".into(),
            author: Some(Author {
                name: "WatchDog".into(),
                url: WATCHDOG_URL.into(),
                icon_url: WATCHDOG_ICON.into(),
            }),
            ..Default::default()
        };
        msg.field("Master Server Uptime", format_uptime(uptime));
        msg
    }

    /// Post the status embed the first time, edit it afterwards.
    pub async fn update(&self) -> Result<()> {
        let msg = self.render(self.started.elapsed());
        let mut message = self.message.lock().await;
        match message.clone() {
            Some(id) => {
                if let Err(e) = self.notifier.edit_embed(&self.channel, &id, &msg).await {
                    // Post a fresh one next time
                    *message = None;
                    return Err(e);
                }
            }
            None => *message = Some(self.notifier.send_embed(&self.channel, &msg).await?),
        }
        Ok(())
    }
}

/// Refresh the status board every `every` until the scheduler is shut down.
pub async fn schedule(board: Arc<StatusBoard>, every: Duration) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await?;
    sched
        .add(Job::new_repeated_async(every, move |_uuid, _l| {
            let board = board.clone();
            Box::pin(async move {
                if let Err(e) = board.update().await {
                    tracing::error!("Failed to update status: {e:#}");
                }
            })
        })?)
        .await?;
    sched.start().await?;
    Ok(sched)
}

#[cfg(test)]
mod tests {
    use eveleve_core::notifier::{Call, RecordingNotifier};

    use super::*;

    fn board(notifier: &Arc<RecordingNotifier>) -> StatusBoard {
        StatusBoard::new(notifier.clone(), "300", Instant::now())
    }

    #[tokio::test]
    async fn test_clear_deletes_recent_messages() {
        let notifier = Arc::new(RecordingNotifier::new().with_recent(&["9", "", "7"]));
        board(&notifier).clear().await.unwrap();
        assert_eq!(notifier.calls(), [
            Call::Delete { channel: "300".into(), message_id: "9".into() },
            Call::Delete { channel: "300".into(), message_id: "7".into() },
        ]);
    }

    #[test]
    fn test_render() {
        let notifier = Arc::new(RecordingNotifier::new());
        let msg = board(&notifier).render(Duration::from_secs(90_061));
        assert_eq!(msg.title, "Status");
        assert_eq!(msg.author.unwrap().name, "WatchDog");
        assert_eq!(msg.fields[0].name, "Master Server Uptime");
        assert_eq!(msg.fields[0].value, "1d 1h 1m 1s");
    }

    #[tokio::test]
    async fn test_posts_once_then_edits() {
        let notifier = Arc::new(RecordingNotifier::new());
        let board = board(&notifier);
        board.update().await.unwrap();
        board.update().await.unwrap();
        board.update().await.unwrap();
        let calls = notifier.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[0], Call::Embed { channel, .. } if channel == "300"));
        for call in &calls[1..] {
            assert!(matches!(call, Call::Edit { message_id, .. } if message_id == "1"));
        }
    }

    #[tokio::test]
    async fn test_failed_edit_posts_again() {
        let notifier = Arc::new(RecordingNotifier::new());
        let board = board(&notifier);
        board.update().await.unwrap();
        notifier.set_failing(true);
        assert!(board.update().await.is_err());
        notifier.set_failing(false);
        board.update().await.unwrap();
        assert_eq!(notifier.embeds_to("300").len(), 2);
    }

    #[tokio::test]
    async fn test_schedule_refreshes_board() {
        let notifier = Arc::new(RecordingNotifier::new());
        let board = Arc::new(board(&notifier));
        let mut sched = schedule(board, Duration::from_secs(1)).await.unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while notifier.embeds_to("300").is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        sched.shutdown().await.unwrap();
        assert_eq!(notifier.embeds_to("300").len(), 1);
    }
}
