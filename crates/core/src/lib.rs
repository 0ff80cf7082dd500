pub mod config;
pub mod models;
pub mod notifier;
pub mod stream;
pub mod util;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Reasons a webhook signature could not be verified.
///
/// Every variant is a rejection; none of them is retried within a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("cannot fetch public key: {0}")]
    KeyFetchFailed(String),
    #[error("invalid public key: {0}")]
    KeyParseFailed(String),
    #[error("cannot decode signature")]
    SignatureMalformed,
    #[error("unauthorized payload")]
    SignatureInvalid,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration unavailable: {0:#}")]
    ConfigUnavailable(anyhow::Error),
    #[error(transparent)]
    VerificationFailed(#[from] VerificationError),
    #[error("event from unverified project {0}")]
    UntrustedSource(String),
    #[error("failed to unmarshal payload: {0}")]
    MalformedPayload(String),
    #[error("notifier unavailable: {0:#}")]
    NotifierUnavailable(anyhow::Error),
    #[error("relay is shutting down")]
    StreamClosed,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::VerificationFailed(_) | Self::MalformedPayload(_) => StatusCode::UNAUTHORIZED,
            // Policy drops are acknowledged so the provider does not redeliver.
            Self::UntrustedSource(_) => StatusCode::OK,
            Self::ConfigUnavailable(_) | Self::NotifierUnavailable(_) | Self::StreamClosed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::VerificationFailed(e) => tracing::info!("Rejected webhook: {e}"),
            Self::MalformedPayload(e) => tracing::warn!("Rejected malformed payload: {e}"),
            Self::UntrustedSource(_) => {}
            _ => tracing::error!("{self}"),
        }
        message_response(status, self.to_string())
    }
}

/// JSON body shared by both webhook listeners: `{"message": "..."}`.
pub fn message_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[tokio::test]
    async fn test_verification_failure_is_unauthorized_json() {
        let response = RelayError::from(VerificationError::SignatureInvalid).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "message": "unauthorized payload" }));
    }

    #[test]
    fn test_untrusted_source_is_acknowledged() {
        assert_eq!(RelayError::UntrustedSource("evil/repo".into()).status(), StatusCode::OK);
        assert_eq!(RelayError::StreamClosed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
