use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use eveleve_core::{VerificationError, config::TravisConfig};
use moka::future::Cache;
use rsa::{
    RsaPublicKey,
    pkcs1v15::{Signature, VerifyingKey},
    pkcs8::DecodePublicKey,
    signature::Verifier,
};
use serde::Deserialize;
use sha1::Sha1;

/// Supplies the RSA key Travis CI signs its notifications with.
#[async_trait]
pub trait PublicKeySource: Send + Sync {
    async fn public_key(&self) -> Result<RsaPublicKey, VerificationError>;
}

/// Fetches the key from the Travis CI `/config` endpoint.
pub struct TravisKeySource {
    client: reqwest::Client,
    api: String,
    cache: Option<Cache<(), RsaPublicKey>>,
}

#[derive(Deserialize)]
struct ConfigDocument {
    config: ConfigBody,
}

#[derive(Deserialize)]
struct ConfigBody {
    notifications: Notifications,
}

#[derive(Deserialize)]
struct Notifications {
    webhook: WebhookSettings,
}

#[derive(Deserialize)]
struct WebhookSettings {
    public_key: String,
}

impl TravisKeySource {
    pub fn new(client: reqwest::Client, config: &TravisConfig) -> Self {
        let cache = (config.key_ttl_secs > 0).then(|| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(config.key_ttl_secs))
                .build()
        });
        Self { client, api: config.api.clone(), cache }
    }

    async fn fetch(&self) -> Result<RsaPublicKey, VerificationError> {
        tracing::debug!("Fetching Travis CI public key from {}", self.api);
        let document: ConfigDocument = self
            .client
            .get(&self.api)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerificationError::KeyFetchFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| VerificationError::KeyFetchFailed(e.to_string()))?;
        parse_public_key(&document.config.notifications.webhook.public_key)
    }
}

#[async_trait]
impl PublicKeySource for TravisKeySource {
    async fn public_key(&self) -> Result<RsaPublicKey, VerificationError> {
        match &self.cache {
            Some(cache) => cache.try_get_with((), self.fetch()).await.map_err(|e| (*e).clone()),
            None => self.fetch().await,
        }
    }
}

pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey, VerificationError> {
    RsaPublicKey::from_public_key_pem(pem.trim())
        .map_err(|e| VerificationError::KeyParseFailed(e.to_string()))
}

/// Check a base64 `Signature` header against the exact payload bytes.
pub fn verify_signature(
    key: &RsaPublicKey,
    payload: &[u8],
    signature: &str,
) -> Result<(), VerificationError> {
    let raw = STANDARD.decode(signature.trim()).map_err(|_| VerificationError::SignatureMalformed)?;
    let signature =
        Signature::try_from(raw.as_slice()).map_err(|_| VerificationError::SignatureMalformed)?;
    VerifyingKey::<Sha1>::new(key.clone())
        .verify(payload, &signature)
        .map_err(|_| VerificationError::SignatureInvalid)
}

pub async fn verify_payload(
    keys: &dyn PublicKeySource,
    payload: &[u8],
    signature: &str,
) -> Result<(), VerificationError> {
    let key = keys.public_key().await?;
    verify_signature(&key, payload, signature)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{Json, Router, extract::State, routing::get};
    use proptest::prelude::*;
    use rsa::{
        RsaPrivateKey,
        pkcs1v15::SigningKey,
        pkcs8::DecodePrivateKey,
        signature::{SignatureEncoding, Signer},
    };
    use serde_json::json;

    use super::*;

    pub(crate) const SIGNING_KEY: &str = include_str!("testdata/signing_key.pem");
    pub(crate) const PUBLIC_KEY: &str = include_str!("testdata/signing_key.pub.pem");
    const OTHER_KEY: &str = include_str!("testdata/other_key.pub.pem");
    pub(crate) const PAYLOAD: &str = include_str!("testdata/build_errored.json");
    pub(crate) const SIGNATURE: &str = include_str!("testdata/build_errored.sig");

    pub(crate) fn sign(payload: &[u8]) -> String {
        let key = RsaPrivateKey::from_pkcs8_pem(SIGNING_KEY).unwrap();
        let signature = SigningKey::<Sha1>::new(key).sign(payload);
        STANDARD.encode(signature.to_vec())
    }

    /// Hands out a fixed key.
    pub(crate) struct StaticKey(pub(crate) Result<RsaPublicKey, VerificationError>);

    #[async_trait]
    impl PublicKeySource for StaticKey {
        async fn public_key(&self) -> Result<RsaPublicKey, VerificationError> { self.0.clone() }
    }

    pub(crate) fn static_key() -> StaticKey { StaticKey(parse_public_key(PUBLIC_KEY)) }

    #[tokio::test]
    async fn test_verify_fixture() {
        verify_payload(&static_key(), PAYLOAD.as_bytes(), SIGNATURE).await.unwrap();
    }

    #[test]
    fn test_fixture_signature_matches_signing_key() {
        assert_eq!(sign(PAYLOAD.as_bytes()), SIGNATURE);
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected() {
        let keys = StaticKey(parse_public_key(OTHER_KEY));
        let err = verify_payload(&keys, PAYLOAD.as_bytes(), SIGNATURE).await.unwrap_err();
        assert_eq!(err, VerificationError::SignatureInvalid);
    }

    #[tokio::test]
    async fn test_key_errors_pass_through() {
        let keys = StaticKey(Err(VerificationError::KeyFetchFailed("offline".into())));
        let err = verify_payload(&keys, PAYLOAD.as_bytes(), SIGNATURE).await.unwrap_err();
        assert_eq!(err, VerificationError::KeyFetchFailed("offline".into()));
    }

    #[test]
    fn test_bad_signature_encoding() {
        let key = parse_public_key(PUBLIC_KEY).unwrap();
        assert_eq!(
            verify_signature(&key, PAYLOAD.as_bytes(), "not base64!"),
            Err(VerificationError::SignatureMalformed)
        );
        // Decodes, but is not a signature of the right length
        assert!(verify_signature(&key, PAYLOAD.as_bytes(), "AAAA").is_err());
    }

    #[test]
    fn test_bad_public_key() {
        assert!(matches!(
            parse_public_key("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----"),
            Err(VerificationError::KeyParseFailed(_))
        ));
        assert!(matches!(parse_public_key(""), Err(VerificationError::KeyParseFailed(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_payload_mutation_fails(index in 0..PAYLOAD.len(), flip in 1u8..=255) {
            let key = parse_public_key(PUBLIC_KEY).unwrap();
            let mut payload = PAYLOAD.as_bytes().to_vec();
            payload[index] ^= flip;
            prop_assert_eq!(
                verify_signature(&key, &payload, SIGNATURE),
                Err(VerificationError::SignatureInvalid)
            );
        }

        #[test]
        fn prop_signature_mutation_fails(index in 0..256usize, flip in 1u8..=255) {
            let key = parse_public_key(PUBLIC_KEY).unwrap();
            let mut raw = STANDARD.decode(SIGNATURE).unwrap();
            raw[index] ^= flip;
            let result = verify_signature(&key, PAYLOAD.as_bytes(), &STANDARD.encode(raw));
            prop_assert!(result.is_err());
        }

        #[test]
        fn prop_signed_payload_verifies(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let key = parse_public_key(PUBLIC_KEY).unwrap();
            prop_assert_eq!(verify_signature(&key, &payload, &sign(&payload)), Ok(()));
        }
    }

    async fn serve_config(public_key: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/config",
                get(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "config": {
                            "host": "travis-ci.com",
                            "notifications": { "webhook": { "public_key": public_key } }
                        }
                    }))
                }),
            )
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/config"), hits)
    }

    fn travis_config(api: String, key_ttl_secs: u64) -> TravisConfig {
        TravisConfig { port: 0, path: "/travis".into(), api, key_ttl_secs }
    }

    #[tokio::test]
    async fn test_key_fetched_per_request_without_ttl() {
        let (api, hits) = serve_config(PUBLIC_KEY).await;
        let keys = TravisKeySource::new(reqwest::Client::new(), &travis_config(api, 0));
        verify_payload(&keys, PAYLOAD.as_bytes(), SIGNATURE).await.unwrap();
        verify_payload(&keys, PAYLOAD.as_bytes(), SIGNATURE).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_key_cached_with_ttl() {
        let (api, hits) = serve_config(PUBLIC_KEY).await;
        let keys = TravisKeySource::new(reqwest::Client::new(), &travis_config(api, 60));
        verify_payload(&keys, PAYLOAD.as_bytes(), SIGNATURE).await.unwrap();
        verify_payload(&keys, PAYLOAD.as_bytes(), SIGNATURE).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_published_key() {
        let (api, _) = serve_config("garbage").await;
        let keys = TravisKeySource::new(reqwest::Client::new(), &travis_config(api, 0));
        let err = verify_payload(&keys, PAYLOAD.as_bytes(), SIGNATURE).await.unwrap_err();
        assert!(matches!(err, VerificationError::KeyParseFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_config_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let keys = TravisKeySource::new(
            reqwest::Client::new(),
            &travis_config(format!("http://{addr}/config"), 0),
        );
        let err = keys.public_key().await.unwrap_err();
        assert!(matches!(err, VerificationError::KeyFetchFailed(_)));
    }
}
