// Metrics module - Prometheus-compatible counters for the derivative service
// Exported as Prometheus text on /metrics

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Request and cache counters, shared across worker threads
#[derive(Debug, Default)]
pub struct Metrics {
    // Request routing
    request_count: AtomicU64,
    pass_through: AtomicU64,
    signature_rejections: AtomicU64,

    // Derivative lifecycle
    cache_hits: AtomicU64,
    derivatives_generated: AtomicU64,
    cap_rejections: AtomicU64,
    source_unreadable: AtomicU64,
    processing_failures: AtomicU64,
    storage_failures: AtomicU64,
    coalesced_waits: AtomicU64,

    // Processor time, microseconds
    processing_micros: AtomicU64,

    // Responses by status code
    status_counts: Mutex<BTreeMap<u16, u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pass_through(&self) {
        self.pass_through.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_signature_rejection(&self) {
        self.signature_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a freshly generated derivative and the processor time it took
    pub fn record_generated(&self, elapsed: Duration) {
        self.derivatives_generated.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.processing_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn increment_cap_rejection(&self) {
        self.cap_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_source_unreadable(&self) {
        self.source_unreadable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_processing_failure(&self) {
        self.processing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_count(&self, status_code: u16) {
        *self.status_counts.lock().entry(status_code).or_insert(0) += 1;
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn get_pass_through_count(&self) -> u64 {
        self.pass_through.load(Ordering::Relaxed)
    }

    pub fn get_signature_rejection_count(&self) -> u64 {
        self.signature_rejections.load(Ordering::Relaxed)
    }

    pub fn get_cache_hit_count(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn get_generated_count(&self) -> u64 {
        self.derivatives_generated.load(Ordering::Relaxed)
    }

    pub fn get_cap_rejection_count(&self) -> u64 {
        self.cap_rejections.load(Ordering::Relaxed)
    }

    pub fn get_source_unreadable_count(&self) -> u64 {
        self.source_unreadable.load(Ordering::Relaxed)
    }

    pub fn get_processing_failure_count(&self) -> u64 {
        self.processing_failures.load(Ordering::Relaxed)
    }

    pub fn get_storage_failure_count(&self) -> u64 {
        self.storage_failures.load(Ordering::Relaxed)
    }

    pub fn get_coalesced_wait_count(&self) -> u64 {
        self.coalesced_waits.load(Ordering::Relaxed)
    }

    pub fn get_status_count(&self, status_code: u16) -> u64 {
        self.status_counts
            .lock()
            .get(&status_code)
            .copied()
            .unwrap_or(0)
    }

    /// Export all metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        let counters = [
            (
                "kagami_requests_total",
                "Total number of HTTP requests received",
                &self.request_count,
            ),
            (
                "kagami_pass_through_total",
                "Requests passed through without transformation",
                &self.pass_through,
            ),
            (
                "kagami_signature_rejections_total",
                "Derivative requests rejected for a bad or missing token",
                &self.signature_rejections,
            ),
            (
                "kagami_cache_hits_total",
                "Derivative requests served from an existing derivative",
                &self.cache_hits,
            ),
            (
                "kagami_derivatives_generated_total",
                "Derivatives produced by the image processor",
                &self.derivatives_generated,
            ),
            (
                "kagami_cap_rejections_total",
                "Requests refused because the source reached its derivative limit",
                &self.cap_rejections,
            ),
            (
                "kagami_source_unreadable_total",
                "Requests whose source image could not be read",
                &self.source_unreadable,
            ),
            (
                "kagami_processing_failures_total",
                "Image processor failures and timeouts",
                &self.processing_failures,
            ),
            (
                "kagami_storage_failures_total",
                "Blob store failures while checking or writing derivatives",
                &self.storage_failures,
            ),
            (
                "kagami_coalesced_waits_total",
                "Requests that waited on an in-flight population of the same derivative",
                &self.coalesced_waits,
            ),
        ];

        for (name, help, counter) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}\n", name, counter.load(Ordering::Relaxed));
        }

        let _ = writeln!(
            output,
            "# HELP kagami_processing_seconds Time spent in the image processor"
        );
        let _ = writeln!(output, "# TYPE kagami_processing_seconds summary");
        let _ = writeln!(
            output,
            "kagami_processing_seconds_sum {}",
            self.processing_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
        );
        let _ = writeln!(
            output,
            "kagami_processing_seconds_count {}\n",
            self.derivatives_generated.load(Ordering::Relaxed)
        );

        let _ = writeln!(
            output,
            "# HELP kagami_responses_by_status_total HTTP responses by status code"
        );
        let _ = writeln!(output, "# TYPE kagami_responses_by_status_total counter");
        for (status, count) in self.status_counts.lock().iter() {
            let _ = writeln!(
                output,
                "kagami_responses_by_status_total{{status=\"{}\"}} {}",
                status, count
            );
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = Metrics::new();
        assert_eq!(metrics.get_request_count(), 0);
        assert_eq!(metrics.get_cache_hit_count(), 0);
        assert_eq!(metrics.get_status_count(200), 0);
    }

    #[test]
    fn test_increment_counters() {
        let metrics = Metrics::new();
        metrics.increment_request_count();
        metrics.increment_request_count();
        metrics.increment_cache_hit();
        metrics.record_generated(Duration::from_millis(250));
        metrics.increment_status_count(404);
        metrics.increment_status_count(404);

        assert_eq!(metrics.get_request_count(), 2);
        assert_eq!(metrics.get_cache_hit_count(), 1);
        assert_eq!(metrics.get_generated_count(), 1);
        assert_eq!(metrics.get_status_count(404), 2);
    }

    #[test]
    fn test_export_prometheus_format() {
        let metrics = Metrics::new();
        metrics.increment_request_count();
        metrics.record_generated(Duration::from_millis(500));
        metrics.increment_status_count(200);

        let output = metrics.export_prometheus();
        assert!(output.contains("# TYPE kagami_requests_total counter"));
        assert!(output.contains("kagami_requests_total 1\n"));
        assert!(output.contains("kagami_derivatives_generated_total 1\n"));
        assert!(output.contains("kagami_processing_seconds_sum 0.5\n"));
        assert!(output.contains("kagami_responses_by_status_total{status=\"200\"} 1"));
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = std::sync::Arc::new(Metrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.increment_request_count();
                        metrics.increment_status_count(200);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.get_request_count(), 8000);
        assert_eq!(metrics.get_status_count(200), 8000);
    }
}
