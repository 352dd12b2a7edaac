//! Server configuration types.
//!
//! Listen address, port and the optional pass-through origin. Default
//! values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ADDRESS, DEFAULT_PORT};

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `host:port` origin serving pass-through requests; unset answers 404
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    #[serde(default)]
    pub upstream_tls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            upstream: None,
            upstream_tls: false,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Split `upstream` into host and port
    pub fn upstream_addr(&self) -> Option<Result<(String, u16), String>> {
        let upstream = self.upstream.as_deref()?;
        Some(parse_host_port(upstream))
    }
}

fn parse_host_port(value: &str) -> Result<(String, u16), String> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("upstream '{}' must be host:port", value))?;
    if host.is_empty() {
        return Err(format!("upstream '{}' has an empty host", value));
    }
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| format!("upstream '{}' has an invalid port", value))?;
    Ok((host.to_string(), port))
}
