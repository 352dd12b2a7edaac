//! Request Orchestrator
//!
//! Per-request state machine, stateless across requests:
//!
//! ```text
//! relativize ── no scope ──────────────▶ PassThrough
//!     │
//! ignore / parse ── not a derivative ──▶ PassThrough
//!     │
//! verify token ── mismatch ────────────▶ Rejected (404)
//!     │
//! ensure ── DerivativeError ───────────▶ Failed { status }
//!     │
//! deliver ── remote store ─────────────▶ Redirect (301)
//!         └─ local store ──────────────▶ Stream (200)
//! ```

use bytes::Bytes;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{DerivativeCache, DerivativeError, DerivativeTarget};
use crate::config::Config;
use crate::constants::TOKEN_QUERY_PARAM;
use crate::metrics::Metrics;
use crate::path::{parse, relativize, ScopeRule};
use crate::processor::ImageProcessor;
use crate::signing::Signer;
use crate::storage::BlobStore;

/// Terminal state of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a derivative request; serve the original asset unchanged
    PassThrough,
    /// Bad or missing token, indistinguishable from a missing resource
    Rejected,
    Redirect {
        location: String,
    },
    Stream {
        content_type: &'static str,
        body: Bytes,
        generated: bool,
    },
    Failed {
        status: u16,
        message: String,
    },
}

impl Outcome {
    /// Status written when the front end answers itself; a pass-through
    /// without an upstream is a 404
    pub fn status(&self) -> u16 {
        match self {
            Outcome::PassThrough | Outcome::Rejected => 404,
            Outcome::Redirect { .. } => 301,
            Outcome::Stream { .. } => 200,
            Outcome::Failed { status, .. } => *status,
        }
    }
}

pub struct RequestOrchestrator {
    rules: Vec<ScopeRule>,
    ignore: Option<Regex>,
    signer: Signer,
    cache: DerivativeCache,
    metrics: Arc<Metrics>,
}

impl RequestOrchestrator {
    pub fn new(
        rules: Vec<ScopeRule>,
        ignore: Option<Regex>,
        signer: Signer,
        cache: DerivativeCache,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            rules,
            ignore,
            signer,
            cache: cache.with_metrics(metrics.clone()),
            metrics,
        }
    }

    /// Wire the components described by a validated configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn BlobStore>,
        processor: Arc<dyn ImageProcessor>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, String> {
        let cache = DerivativeCache::new(store, processor, config.cache_settings());
        Ok(Self::new(
            config.scope_rules()?,
            config.ignore_pattern()?,
            config.signer(),
            cache,
            metrics,
        ))
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Resolve one request path (query excluded) and its token
    pub async fn handle(&self, path: &str, token: Option<&str>) -> Outcome {
        // Routing predicates: scope, then grammar
        let matched = match relativize(path, &self.rules) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(path, error = %e, "Outside configured scopes, passing through");
                return self.pass_through();
            }
        };
        if self
            .ignore
            .as_ref()
            .map(|ignore| ignore.is_match(path))
            .unwrap_or(false)
        {
            debug!(path, "Ignored path, passing through");
            return self.pass_through();
        }
        let Some(request) = parse(&matched.relative_path) else {
            debug!(path, "Not a derivative path, passing through");
            return self.pass_through();
        };

        if !self.signer.verify(path, token) {
            self.metrics.increment_signature_rejection();
            warn!(path, "Signature mismatch");
            return Outcome::Rejected;
        }

        let store = self.cache.store();
        let mount = store.mount(matched.rule.source_root(), matched.rule.derivative_root());
        let target = DerivativeTarget::new(&mount, &request, &matched.relative_path);

        let derivative = match self.cache.ensure(&request, &target).await {
            Ok(derivative) => derivative,
            Err(e) => return failed(&e),
        };

        if store.is_remote() {
            return match store.public_url(&derivative.store_key) {
                Some(location) => Outcome::Redirect { location },
                None => Outcome::Failed {
                    status: 500,
                    message: format!("No public URL for '{}'", derivative.store_key),
                },
            };
        }

        let content_type = request.content_type().unwrap_or("application/octet-stream");
        let body = match derivative.data {
            Some(data) => data,
            None => match store.read(&derivative.store_key).await {
                Ok(data) => data,
                Err(e) => return failed(&DerivativeError::Storage(e)),
            },
        };
        Outcome::Stream {
            content_type,
            body,
            generated: derivative.generated,
        }
    }

    fn pass_through(&self) -> Outcome {
        self.metrics.increment_pass_through();
        Outcome::PassThrough
    }
}

fn failed(error: &DerivativeError) -> Outcome {
    Outcome::Failed {
        status: error.to_http_status(),
        message: error.to_string(),
    }
}

/// Percent-decoded `token` value from a raw query string
pub fn token_from_query(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == TOKEN_QUERY_PARAM)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::path::{TransformOptions, UrlEncoder};
    use crate::processor::{ImageError, ProcessParams};
    use crate::storage::MemoryStore;

    struct EchoProcessor;

    impl ImageProcessor for EchoProcessor {
        fn process(&self, source: &[u8], params: &ProcessParams) -> Result<Vec<u8>, ImageError> {
            if source == b"BROKEN" {
                return Err(ImageError::decode_failed("broken"));
            }
            Ok(format!("{}:{:?}", params.format.as_str(), params.width).into_bytes())
        }
    }

    fn rules() -> Vec<ScopeRule> {
        vec![ScopeRule::new(
            Regex::new(r"^/media/(.+)$").unwrap(),
            "uploads",
            "uploads/_derivatives",
        )]
    }

    fn orchestrator(store: Arc<MemoryStore>, signer: Signer) -> RequestOrchestrator {
        let cache = DerivativeCache::new(
            store,
            Arc::new(EchoProcessor),
            CacheSettings {
                max_derivatives: 2,
                ..CacheSettings::default()
            },
        );
        RequestOrchestrator::new(
            rules(),
            Some(Regex::new(r"\.svg$").unwrap()),
            signer,
            cache,
            Arc::new(Metrics::new()),
        )
    }

    fn local_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert("uploads/cats/tom.jpg", "TOM");
        store.insert("uploads/broken.png", "BROKEN");
        store
    }

    #[tokio::test]
    async fn test_pass_through_cases() {
        let orchestrator = orchestrator(local_store(), Signer::disabled());
        for path in [
            "/assets/tom-10x10.jpg",
            "/media/cats/tom.jpg",
            "/media/cats/tom-_x_.jpg",
            "/media/icons/logo-10x10.svg",
        ] {
            assert_eq!(orchestrator.handle(path, None).await, Outcome::PassThrough, "{}", path);
        }
        assert_eq!(orchestrator.metrics().get_pass_through_count(), 4);
    }

    #[tokio::test]
    async fn test_stream_from_local_store() {
        let store = local_store();
        let orchestrator = orchestrator(store.clone(), Signer::disabled());

        let first = orchestrator.handle("/media/cats/tom-10x_.jpg", None).await;
        assert_eq!(
            first,
            Outcome::Stream {
                content_type: "image/jpeg",
                body: Bytes::from_static(b"jpeg:Some(10)"),
                generated: true,
            }
        );
        assert!(store
            .keys()
            .contains(&"uploads/_derivatives/cats/tom-10x_.jpg".to_string()));

        let second = orchestrator.handle("/media/cats/tom-10x_.jpg", None).await;
        assert_eq!(
            second,
            Outcome::Stream {
                content_type: "image/jpeg",
                body: Bytes::from_static(b"jpeg:Some(10)"),
                generated: false,
            }
        );
        assert_eq!(second.status(), 200);
    }

    #[tokio::test]
    async fn test_redirect_for_remote_store() {
        let store = Arc::new(MemoryStore::remote("https://cdn.example.com"));
        store.insert("uploads/cats/tom.jpg", "TOM");
        let orchestrator = orchestrator(store, Signer::disabled());

        let outcome = orchestrator.handle("/media/cats/tom-10x10.jpg", None).await;
        assert_eq!(
            outcome,
            Outcome::Redirect {
                location: "https://cdn.example.com/uploads/_derivatives/cats/tom-10x10.jpg"
                    .to_string()
            }
        );
        assert_eq!(outcome.status(), 301);
    }

    #[tokio::test]
    async fn test_signature_checked_after_routing() {
        let signer = Signer::with_key("secret");
        let orchestrator = orchestrator(local_store(), signer.clone());

        assert_eq!(orchestrator.handle("/media/cats/tom.jpg", None).await, Outcome::PassThrough);
        assert_eq!(
            orchestrator.handle("/media/cats/tom-10x10.jpg", None).await,
            Outcome::Rejected
        );
        assert_eq!(
            orchestrator
                .handle("/media/cats/tom-10x10.jpg", Some("AAAAAAAAAAAAAAAA"))
                .await,
            Outcome::Rejected
        );

        let encoder = UrlEncoder::new(None, None, signer);
        let url = encoder
            .encode("/media/cats/tom.jpg", Some(10.0), Some(10.0), &TransformOptions::new())
            .unwrap();
        let (path, query) = url.split_once('?').unwrap();
        let token = token_from_query(Some(query));
        let outcome = orchestrator.handle(path, token.as_deref()).await;
        assert!(matches!(outcome, Outcome::Stream { generated: true, .. }));
        assert_eq!(orchestrator.metrics().get_signature_rejection_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_statuses() {
        let orchestrator = orchestrator(local_store(), Signer::disabled());

        let missing = orchestrator.handle("/media/cats/felix-10x10.jpg", None).await;
        assert_eq!(missing.status(), 404);

        let broken = orchestrator.handle("/media/broken-10x10.png", None).await;
        assert!(matches!(broken, Outcome::Failed { status: 500, .. }));

        orchestrator.handle("/media/cats/tom-1x1.jpg", None).await;
        orchestrator.handle("/media/cats/tom-2x2.jpg", None).await;
        let capped = orchestrator.handle("/media/cats/tom-3x3.jpg", None).await;
        assert!(
            matches!(capped, Outcome::Failed { status: 500, ref message } if message.contains("limit"))
        );
    }

    #[test]
    fn test_token_from_query() {
        assert_eq!(token_from_query(None), None);
        assert_eq!(token_from_query(Some("a=1")), None);
        assert_eq!(
            token_from_query(Some("a=1&token=ab-_cd")).as_deref(),
            Some("ab-_cd")
        );
        assert_eq!(token_from_query(Some("token=a%2Db")).as_deref(), Some("a-b"));
    }
}
