// Request pipeline module - per-request context carried through the proxy phases

use std::time::{Duration, Instant};
use uuid::Uuid;

/// Request context created for every HTTP request
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    query: Option<String>,
    started: Instant,
    /// Set once the request has been handed to the upstream origin
    pass_through: bool,
}

impl RequestContext {
    /// Generates a unique request ID (UUID v4) and starts the request clock
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: method.into(),
            path: path.into(),
            query: None,
            started: Instant::now(),
            pass_through: false,
        }
    }

    /// Record the request line once headers are available
    pub fn set_request(
        &mut self,
        method: impl Into<String>,
        path: impl Into<String>,
        query: Option<String>,
    ) {
        self.method = method.into();
        self.path = path.into();
        self.query = query;
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_pass_through(&self) -> bool {
        self.pass_through
    }

    pub fn mark_pass_through(&mut self) {
        self.pass_through = true;
    }
}
