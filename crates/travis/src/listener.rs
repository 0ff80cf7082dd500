use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::post,
};
use eveleve_core::{RelayError, VerificationError, message_response, stream::EventSender};
use serde::Deserialize;

use crate::{
    payload::BuildEvent,
    verify::{PublicKeySource, verify_payload},
};

pub const SIGNATURE_HEADER: &str = "Signature";

/// HTTP endpoint receiving Travis CI build notifications.
#[derive(Clone)]
pub struct TravisListener {
    keys: Arc<dyn PublicKeySource>,
    events: EventSender<BuildEvent>,
}

#[derive(Deserialize)]
struct WebhookForm {
    payload: String,
}

impl TravisListener {
    pub fn new(keys: Arc<dyn PublicKeySource>, events: EventSender<BuildEvent>) -> Self {
        Self { keys, events }
    }

    pub fn router(self, path: &str) -> Router {
        Router::new().route(path, post(receive)).with_state(self)
    }
}

async fn receive(
    State(listener): State<TravisListener>,
    headers: HeaderMap,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> Result<Response, RelayError> {
    let Form(form) = form.map_err(|e| RelayError::MalformedPayload(e.body_text()))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(VerificationError::SignatureMalformed)?;
    verify_payload(listener.keys.as_ref(), form.payload.as_bytes(), signature).await?;
    let event = BuildEvent::parse(&form.payload)
        .map_err(|e| RelayError::MalformedPayload(e.to_string()))?;
    tracing::info!(
        "Verified Travis CI build {} for {}: {}",
        event.number,
        event.repository.slug(),
        event.state
    );
    listener.events.send(event).await?;
    Ok(message_response(StatusCode::OK, "payload verified"))
}
