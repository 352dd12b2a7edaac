//! Blob store selection

use serde::{Deserialize, Serialize};

use crate::storage::S3Settings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        root: String,
    },
    S3 {
        bucket: String,
        region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        public_url: Option<String>,
    },
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Local { root } => {
                if root.trim().is_empty() {
                    return Err("storage.root cannot be empty".to_string());
                }
            }
            StorageConfig::S3 { bucket, region, .. } => {
                if bucket.trim().is_empty() {
                    return Err("storage.bucket cannot be empty".to_string());
                }
                if region.trim().is_empty() {
                    return Err("storage.region cannot be empty".to_string());
                }
            }
        }
        Ok(())
    }

    /// Connection settings when the store is S3
    pub fn s3_settings(&self) -> Option<S3Settings> {
        match self {
            StorageConfig::Local { .. } => None,
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                access_key,
                secret_key,
                public_url,
            } => Some(S3Settings {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                public_url: public_url.clone(),
            }),
        }
    }
}
