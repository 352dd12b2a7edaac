// Configuration module

mod derivatives;
mod server;
mod storage;

pub use derivatives::{DerivativesConfig, PathConfig};
pub use server::ServerConfig;
pub use storage::StorageConfig;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheSettings;
use crate::logging::LogFormat;
use crate::path::{ScopeRule, UrlEncoder};
use crate::processor::ProcessingDefaults;
use crate::signing::Signer;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub derivatives: DerivativesConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse YAML after replacing `${VAR_NAME}` with environment values
    ///
    /// Fails when a referenced variable is not set.
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }
        if let Some(upstream) = self.server.upstream_addr() {
            upstream?;
        }
        self.derivatives.validate()?;
        self.storage.validate()?;
        Ok(())
    }

    /// Compile the scope rules in configuration order
    pub fn scope_rules(&self) -> Result<Vec<ScopeRule>, String> {
        self.derivatives
            .paths
            .iter()
            .map(|path| {
                let pattern = Regex::new(&path.pattern)
                    .map_err(|e| format!("Invalid path pattern '{}': {}", path.pattern, e))?;
                Ok(ScopeRule::new(
                    pattern,
                    path.source_root.clone(),
                    path.derivative_root(),
                ))
            })
            .collect()
    }

    pub fn ignore_pattern(&self) -> Result<Option<Regex>, String> {
        self.derivatives
            .ignore
            .as_deref()
            .map(|ignore| {
                Regex::new(ignore).map_err(|e| format!("Invalid ignore pattern '{}': {}", ignore, e))
            })
            .transpose()
    }

    pub fn signer(&self) -> Signer {
        Signer::new(
            self.derivatives
                .signing_key
                .as_ref()
                .map(|key| key.as_bytes().to_vec()),
        )
    }

    pub fn url_encoder(&self) -> Result<UrlEncoder, String> {
        Ok(UrlEncoder::new(
            self.ignore_pattern()?,
            self.derivatives.url_prefix.clone(),
            self.signer(),
        ))
    }

    pub fn processing_defaults(&self) -> ProcessingDefaults {
        ProcessingDefaults {
            jpeg_quality: self.derivatives.jpeg_quality,
            interlace: self.derivatives.interlace,
            upscale: self.derivatives.upscale,
            max_width: self.derivatives.max_width,
            max_height: self.derivatives.max_height,
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_derivatives: self.derivatives.max_derivatives,
            processing_timeout: Duration::from_secs(self.derivatives.processing_timeout_secs),
            defaults: self.processing_defaults(),
        }
    }
}
