//! Derivative Cache Manager
//!
//! Owns the derivative lifecycle: existence check, per-source cap, source
//! read, processing and storage. Derivatives are immutable once written and
//! never evicted; the cap refuses new derivatives instead of dropping old
//! ones.

mod coalescing;
mod error;

#[cfg(test)]
mod tests;

pub use coalescing::{CoalescingSlot, LeaderGuard, RequestCoalescer};
pub use error::DerivativeError;

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_MAX_DERIVATIVES, DEFAULT_PROCESSING_TIMEOUT_SECS};
use crate::metrics::Metrics;
use crate::path::{basename, parse, split_extension, Mount, TransformRequest};
use crate::processor::{ImageProcessor, ProcessParams, ProcessingDefaults};
use crate::storage::BlobStore;

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Derivatives allowed per source; 0 disables the cap
    pub max_derivatives: usize,
    pub processing_timeout: Duration,
    pub defaults: ProcessingDefaults,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_derivatives: DEFAULT_MAX_DERIVATIVES,
            processing_timeout: Duration::from_secs(DEFAULT_PROCESSING_TIMEOUT_SECS),
            defaults: ProcessingDefaults::default(),
        }
    }
}

/// Store keys for one derivative request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeTarget {
    pub source_key: String,
    pub store_key: String,
}

impl DerivativeTarget {
    /// `relative_path` is the encoded derivative path relative to the mount
    pub fn new(mount: &Mount, request: &TransformRequest, relative_path: &str) -> Self {
        Self {
            source_key: mount.source_key(&request.source_path),
            store_key: mount.derivative_key(relative_path),
        }
    }
}

/// Handle to a stored derivative
#[derive(Debug, Clone)]
pub struct Derivative {
    pub store_key: String,
    /// True when this call produced the derivative
    pub generated: bool,
    /// Freshly produced bytes; `None` on a cache hit
    pub data: Option<Bytes>,
}

pub struct DerivativeCache {
    store: Arc<dyn BlobStore>,
    processor: Arc<dyn ImageProcessor>,
    settings: CacheSettings,
    coalescer: RequestCoalescer,
    metrics: Arc<Metrics>,
}

impl DerivativeCache {
    pub fn new(
        store: Arc<dyn BlobStore>,
        processor: Arc<dyn ImageProcessor>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            store,
            processor,
            settings,
            coalescer: RequestCoalescer::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Return the derivative for `request`, producing it on first use
    ///
    /// An existing derivative is returned without re-validating the source.
    /// Concurrent callers for the same store key share one population.
    ///
    /// # Errors
    ///
    /// - `TooManyDerivatives` when the source already has the maximum
    /// - `SourceUnreadable` when the source cannot be read
    /// - `ProcessingFailed` for parameter, processor or timeout failures
    /// - `Storage` when the store cannot be checked or written
    pub async fn ensure(
        &self,
        request: &TransformRequest,
        target: &DerivativeTarget,
    ) -> Result<Derivative, DerivativeError> {
        loop {
            if self.store.exists(&target.store_key).await? {
                return Ok(self.hit(target));
            }

            match self.coalescer.acquire(&target.store_key).await {
                CoalescingSlot::Follower => {
                    self.metrics.increment_coalesced_wait();
                    debug!(store_key = %target.store_key, "Woke after in-flight population");
                }
                CoalescingSlot::Leader(guard) => {
                    // A previous leader may have finished between the check and the slot
                    if self.store.exists(&target.store_key).await? {
                        return Ok(self.hit(target));
                    }
                    let result = self.populate(request, target).await;
                    drop(guard);
                    return result;
                }
            }
        }
    }

    fn hit(&self, target: &DerivativeTarget) -> Derivative {
        self.metrics.increment_cache_hit();
        debug!(store_key = %target.store_key, "Derivative cache hit");
        Derivative {
            store_key: target.store_key.clone(),
            generated: false,
            data: None,
        }
    }

    async fn populate(
        &self,
        request: &TransformRequest,
        target: &DerivativeTarget,
    ) -> Result<Derivative, DerivativeError> {
        if self.settings.max_derivatives > 0 {
            let count = self.count_siblings(request, target).await?;
            if count >= self.settings.max_derivatives {
                self.metrics.increment_cap_rejection();
                warn!(
                    source_key = %target.source_key,
                    count,
                    max = self.settings.max_derivatives,
                    "Derivative limit reached"
                );
                return Err(DerivativeError::TooManyDerivatives {
                    source_key: target.source_key.clone(),
                    count,
                    max: self.settings.max_derivatives,
                });
            }
        }

        let source = self.store.read(&target.source_key).await.map_err(|e| {
            self.metrics.increment_source_unreadable();
            DerivativeError::SourceUnreadable {
                source_key: target.source_key.clone(),
                reason: e.to_string(),
            }
        })?;

        let started = Instant::now();
        let data = self.process(request, source).await.map_err(|e| {
            self.metrics.increment_processing_failure();
            warn!(store_key = %target.store_key, error = %e, "Derivative processing failed");
            e
        })?;
        let elapsed = started.elapsed();

        let data = Bytes::from(data);
        self.store
            .write(&target.store_key, data.clone())
            .await
            .map_err(|e| {
                self.metrics.increment_storage_failure();
                DerivativeError::Storage(e)
            })?;

        self.metrics.record_generated(elapsed);
        info!(
            store_key = %target.store_key,
            bytes = data.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Derivative generated"
        );

        Ok(Derivative {
            store_key: target.store_key.clone(),
            generated: true,
            data: Some(data),
        })
    }

    /// Run the processor on the blocking pool under the configured timeout
    async fn process(
        &self,
        request: &TransformRequest,
        source: Bytes,
    ) -> Result<Vec<u8>, DerivativeError> {
        let params = ProcessParams::resolve(request, &self.settings.defaults)
            .map_err(|e| DerivativeError::ProcessingFailed(e.to_string()))?;

        let processor = Arc::clone(&self.processor);
        let job = tokio::task::spawn_blocking(move || processor.process(&source, &params));

        match tokio::time::timeout(self.settings.processing_timeout, job).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(e))) => Err(DerivativeError::ProcessingFailed(e.to_string())),
            Ok(Err(join_error)) => Err(DerivativeError::ProcessingFailed(format!(
                "processor panicked: {}",
                join_error
            ))),
            Err(_) => Err(DerivativeError::ProcessingFailed(format!(
                "timed out after {}ms",
                self.settings.processing_timeout.as_millis()
            ))),
        }
    }

    /// Count stored derivatives of the same source in the target's directory
    async fn count_siblings(
        &self,
        request: &TransformRequest,
        target: &DerivativeTarget,
    ) -> Result<usize, DerivativeError> {
        let source_name = basename(&request.source_path);
        let Some((stem, _)) = split_extension(source_name) else {
            return Ok(0);
        };

        let dir = match target.store_key.rfind('/') {
            Some(idx) => &target.store_key[..=idx],
            None => "",
        };
        let prefix = format!("{}{}-", dir, stem);

        let keys = self.store.list(&prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(dir))
            .filter(|name| !name.contains('/'))
            .filter_map(parse)
            .filter(|sibling| sibling.source_path == source_name)
            .count())
    }
}
