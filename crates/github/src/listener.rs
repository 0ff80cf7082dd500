use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, State},
    http::StatusCode,
    response::Response,
    routing::post,
};
use eveleve_core::{RelayError, message_response, notifier::Notifier, stream::EventSender};

use crate::{
    events::{RepoEvent, RepoEventKind},
    trust::TrustedProjects,
    webhook::{GitHubDelivery, WebhookSecret},
};

/// Audit line posted to the log channel for events from unknown repositories.
pub const UNTRUSTED_NOTICE: &str = "Repository event from unverified project";

/// HTTPS endpoint receiving GitHub repository webhooks.
#[derive(Clone)]
pub struct GitHubListener {
    secret: WebhookSecret,
    trusted: Arc<TrustedProjects>,
    notifier: Arc<dyn Notifier>,
    log_channel: String,
    events: EventSender<RepoEvent>,
}

impl FromRef<GitHubListener> for WebhookSecret {
    fn from_ref(listener: &GitHubListener) -> Self { listener.secret.clone() }
}

impl GitHubListener {
    pub fn new(
        secret: WebhookSecret,
        trusted: Arc<TrustedProjects>,
        notifier: Arc<dyn Notifier>,
        log_channel: impl Into<String>,
        events: EventSender<RepoEvent>,
    ) -> Self {
        Self { secret, trusted, notifier, log_channel: log_channel.into(), events }
    }

    pub fn router(self, path: &str) -> Router {
        Router::new().route(path, post(receive)).with_state(self)
    }

    async fn check_trust(&self, event: &RepoEvent) -> Result<(), RelayError> {
        match event.full_name() {
            Some(name) if self.trusted.contains(name) => Ok(()),
            name => {
                let name = name.unwrap_or("<none>");
                tracing::warn!("Payload {} came from unverified project: {name}", event.kind());
                if let Err(e) = self.notifier.send_text(&self.log_channel, UNTRUSTED_NOTICE).await
                {
                    tracing::error!("Failed to send audit log: {e:#}");
                }
                Err(RelayError::UntrustedSource(name.to_string()))
            }
        }
    }
}

async fn receive(
    State(listener): State<GitHubListener>,
    delivery: GitHubDelivery,
) -> Result<Response, RelayError> {
    let Some(kind) = RepoEventKind::from_name(&delivery.event) else {
        tracing::info!("Received payload for a different event: {}", delivery.event);
        return Ok(message_response(StatusCode::OK, "event ignored"));
    };
    let event = RepoEvent::parse(kind, &delivery.body)
        .map_err(|e| RelayError::MalformedPayload(e.to_string()))?;
    listener.check_trust(&event).await?;
    tracing::info!("Accepted {kind} event from {}", event.full_name().unwrap_or_default());
    listener.events.send(event).await?;
    Ok(message_response(StatusCode::OK, "event received"))
}
