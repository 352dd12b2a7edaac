// Proxy module - Pingora ProxyHttp implementation
// Answers derivative requests itself and forwards everything else to the
// optional upstream origin

pub mod endpoints;
pub mod response;

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::Metrics;
use crate::orchestrator::{token_from_query, Outcome, RequestOrchestrator};
use crate::pipeline::RequestContext;

pub use endpoints::{handle_health, handle_metrics};
pub use response::{write_response, ProxyResponse};

/// Origin that serves pass-through requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// KagamiProxy implements the Pingora ProxyHttp trait
pub struct KagamiProxy {
    orchestrator: Arc<RequestOrchestrator>,
    metrics: Arc<Metrics>,
    upstream: Option<Upstream>,
    /// Proxy start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl KagamiProxy {
    pub fn new(orchestrator: Arc<RequestOrchestrator>, upstream: Option<Upstream>) -> Self {
        let metrics = orchestrator.metrics().clone();
        Self {
            orchestrator,
            metrics,
            upstream,
            start_time: Instant::now(),
        }
    }

    /// Decide the response for one request, or `None` to forward it upstream
    ///
    /// `path` is the raw request path as it arrived on the wire. It is
    /// percent-decoded before routing; a path that does not decode to UTF-8
    /// is passed through.
    pub async fn respond(&self, method: &str, path: &str, query: Option<&str>) -> Option<ProxyResponse> {
        if let Some(response) = endpoints::special_endpoint(path, self.start_time, &self.metrics) {
            return Some(response);
        }

        // Only reads can produce derivatives
        let outcome = match decode_request_path(path) {
            Some(decoded) if method == "GET" || method == "HEAD" => {
                let token = token_from_query(query);
                self.orchestrator.handle(&decoded, token.as_deref()).await
            }
            _ => Outcome::PassThrough,
        };

        if outcome == Outcome::PassThrough && self.upstream.is_some() {
            return None;
        }
        Some(ProxyResponse::from_outcome(outcome))
    }
}

/// Percent-decode a request path, `None` when the bytes are not UTF-8
pub fn decode_request_path(path: &str) -> Option<String> {
    match urlencoding::decode(path) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(e) => {
            tracing::debug!(path, error = %e, "Request path is not UTF-8 once decoded");
            None
        }
    }
}

#[async_trait]
impl ProxyHttp for KagamiProxy {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new("", "")
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let upstream = self
            .upstream
            .as_ref()
            .filter(|_| ctx.is_pass_through())
            .ok_or_else(|| {
                pingora_core::Error::explain(
                    pingora_core::ErrorType::InternalError,
                    "No upstream for this request",
                )
            })?;

        tracing::debug!(
            request_id = %ctx.request_id(),
            upstream = %format!("{}:{}", upstream.host, upstream.port),
            "Forwarding pass-through request"
        );

        Ok(Box::new(HttpPeer::new(
            (upstream.host.clone(), upstream.port),
            upstream.tls,
            upstream.host.clone(),
        )))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        ctx.set_request(
            req.method.as_str(),
            req.uri.path(),
            req.uri.query().map(str::to_string),
        );
        self.metrics.increment_request_count();

        let response = self
            .respond(ctx.method(), ctx.path(), ctx.query())
            .await;

        match response {
            Some(response) => {
                let head_only = ctx.method() == "HEAD";
                write_response(session, response, head_only).await?;
                Ok(true)
            }
            None => {
                ctx.mark_pass_through();
                Ok(false)
            }
        }
    }

    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);
        self.metrics.increment_status_count(status_code);

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status_code,
            pass_through = ctx.is_pass_through(),
            duration_ms = ctx.elapsed().as_millis() as u64,
            "Request completed"
        );
    }
}
