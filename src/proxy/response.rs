//! Response construction and writing.
//!
//! Responses are built as plain values so the mapping from outcomes to HTTP
//! stays testable; [`write_response`] puts one on the wire.

use bytes::Bytes;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::Session;

use crate::orchestrator::Outcome;

/// Derivatives never change once written
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: Bytes::from(body),
        }
    }

    /// Plain text in Prometheus exposition format
    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type", "text/plain; version=0.0.4".to_string())],
            body: Bytes::from(body),
        }
    }

    pub fn redirect(location: String) -> Self {
        Self {
            status: 301,
            headers: vec![
                ("Location", location),
                ("Cache-Control", IMMUTABLE_CACHE_CONTROL.to_string()),
            ],
            body: Bytes::new(),
        }
    }

    pub fn image(content_type: &'static str, body: Bytes) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Content-Type", content_type.to_string()),
                ("Cache-Control", IMMUTABLE_CACHE_CONTROL.to_string()),
            ],
            body,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({
            "error": message,
            "status": status,
        })
        .to_string();
        Self::json(status, body)
    }

    /// Response for an outcome the front end answers itself
    pub fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::PassThrough | Outcome::Rejected => Self::empty(404),
            Outcome::Redirect { location } => Self::redirect(location),
            Outcome::Stream {
                content_type, body, ..
            } => Self::image(content_type, body),
            Outcome::Failed { status, message } => Self::error(status, &message),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Write a complete response; HEAD requests get headers only
pub async fn write_response(
    session: &mut Session,
    response: ProxyResponse,
    head_only: bool,
) -> Result<()> {
    let mut header = ResponseHeader::build(response.status, None)?;
    for (name, value) in &response.headers {
        header.insert_header(*name, value.as_str())?;
    }
    header.insert_header("Content-Length", response.body.len().to_string())?;

    if head_only || response.body.is_empty() {
        session
            .write_response_header(Box::new(header), true)
            .await?;
    } else {
        session
            .write_response_header(Box::new(header), false)
            .await?;
        session
            .write_response_body(Some(response.body), true)
            .await?;
    }
    Ok(())
}
