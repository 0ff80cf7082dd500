use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Request},
    http::HeaderMap,
};
use eveleve_core::{RelayError, VerificationError};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const SIGNATURE_256_HEADER: &str = "X-Hub-Signature-256";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Shared secret configured on the GitHub webhook.
#[derive(Clone)]
pub struct WebhookSecret(Arc<str>);

impl WebhookSecret {
    pub fn new(secret: &str) -> Self { Self(secret.into()) }
}

/// Signature-checked GitHub delivery: the event name and the raw body.
#[derive(Clone)]
#[must_use]
pub struct GitHubDelivery {
    pub event: String,
    pub body: Bytes,
}

impl<S> FromRequest<S> for GitHubDelivery
where
    WebhookSecret: FromRef<S>,
    S: Send + Sync + Clone,
{
    type Rejection = RelayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let secret = WebhookSecret::from_ref(state);
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| RelayError::MalformedPayload(e.body_text()))?;
        verify_signature(&secret, &headers, &body)?;
        let event = headers
            .get(EVENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RelayError::MalformedPayload(format!("{EVENT_HEADER} header missing")))?
            .to_string();
        Ok(GitHubDelivery { event, body })
    }
}

/// Check `X-Hub-Signature-256`, falling back to the legacy SHA-1 header.
pub fn verify_signature(
    secret: &WebhookSecret,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), VerificationError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Some(value) = header(SIGNATURE_256_HEADER) {
        let signature = decode(value, "sha256=")?;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.0.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(body);
        mac.verify_slice(&signature).map_err(|_| VerificationError::SignatureInvalid)
    } else if let Some(value) = header(SIGNATURE_HEADER) {
        let signature = decode(value, "sha1=")?;
        let mut mac = Hmac::<Sha1>::new_from_slice(secret.0.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(body);
        mac.verify_slice(&signature).map_err(|_| VerificationError::SignatureInvalid)
    } else {
        Err(VerificationError::SignatureMalformed)
    }
}

fn decode(value: &str, prefix: &str) -> Result<Vec<u8>, VerificationError> {
    value
        .strip_prefix(prefix)
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
        .ok_or(VerificationError::SignatureMalformed)
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::http::{HeaderName, HeaderValue};

    use super::*;

    pub(crate) fn sign_sha256(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    pub(crate) fn sign_sha1(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn headers(pairs: &[(&'static str, String)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    const BODY: &[u8] = br#"{"zen":"Keep it logically awesome."}"#;

    #[test]
    fn test_sha256_signature() {
        let secret = WebhookSecret::new("hunter2");
        let good = headers(&[(SIGNATURE_256_HEADER, sign_sha256("hunter2", BODY))]);
        assert_eq!(verify_signature(&secret, &good, BODY), Ok(()));
        let wrong = headers(&[(SIGNATURE_256_HEADER, sign_sha256("hunter3", BODY))]);
        assert_eq!(verify_signature(&secret, &wrong, BODY), Err(VerificationError::SignatureInvalid));
    }

    #[test]
    fn test_sha1_fallback() {
        let secret = WebhookSecret::new("hunter2");
        let good = headers(&[(SIGNATURE_HEADER, sign_sha1("hunter2", BODY))]);
        assert_eq!(verify_signature(&secret, &good, BODY), Ok(()));
        assert_eq!(
            verify_signature(&secret, &good, b"{}"),
            Err(VerificationError::SignatureInvalid)
        );
    }

    #[test]
    fn test_sha256_takes_precedence() {
        let secret = WebhookSecret::new("hunter2");
        let map = headers(&[
            (SIGNATURE_256_HEADER, sign_sha256("wrong", BODY)),
            (SIGNATURE_HEADER, sign_sha1("hunter2", BODY)),
        ]);
        assert_eq!(verify_signature(&secret, &map, BODY), Err(VerificationError::SignatureInvalid));
    }

    #[test]
    fn test_malformed_headers() {
        let secret = WebhookSecret::new("hunter2");
        for map in [
            HeaderMap::new(),
            headers(&[(SIGNATURE_256_HEADER, "abcd".into())]),
            headers(&[(SIGNATURE_256_HEADER, "sha256=xyz".into())]),
            headers(&[(SIGNATURE_256_HEADER, sign_sha1("hunter2", BODY))]),
        ] {
            assert_eq!(
                verify_signature(&secret, &map, BODY),
                Err(VerificationError::SignatureMalformed)
            );
        }
    }
}
