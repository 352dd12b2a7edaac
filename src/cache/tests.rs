use super::*;
use crate::path::{parse, TransformRequest};
use crate::processor::ImageError;
use crate::storage::{MemoryStore, StorageError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Processor returning a fixed payload and counting invocations
struct StubProcessor {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl StubProcessor {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageProcessor for StubProcessor {
    fn process(&self, source: &[u8], params: &ProcessParams) -> Result<Vec<u8>, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            return Err(ImageError::decode_failed("stub failure"));
        }
        let mut out = format!("{:?}x{:?}:", params.width, params.height).into_bytes();
        out.extend_from_slice(source);
        Ok(out)
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    processor: Arc<StubProcessor>,
    cache: Arc<DerivativeCache>,
    mount: Mount,
}

fn fixture_with(processor: StubProcessor, settings: CacheSettings) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.insert("src/cat.jpg", "CAT");
    store.insert("src/dog.jpg", "DOG");
    let processor = Arc::new(processor);
    let cache = Arc::new(DerivativeCache::new(
        store.clone(),
        processor.clone(),
        settings,
    ));
    Fixture {
        store,
        processor,
        cache,
        mount: Mount::new("src", "out"),
    }
}

fn fixture() -> Fixture {
    fixture_with(StubProcessor::new(), CacheSettings::default())
}

fn capped(max: usize) -> CacheSettings {
    CacheSettings {
        max_derivatives: max,
        ..CacheSettings::default()
    }
}

fn target(fixture: &Fixture, path: &str) -> (TransformRequest, DerivativeTarget) {
    let request = parse(path).expect("test path should parse");
    let target = DerivativeTarget::new(&fixture.mount, &request, path);
    (request, target)
}

#[test]
fn test_target_keys() {
    let f = fixture();
    let (_, target) = target(&f, "a/cat-10x10.jpg");
    assert_eq!(target.source_key, "src/a/cat.jpg");
    assert_eq!(target.store_key, "out/a/cat-10x10.jpg");
}

#[tokio::test]
async fn test_first_request_generates_then_hits() {
    let f = fixture();
    let (request, target) = target(&f, "cat-10x20.jpg");

    let first = f.cache.ensure(&request, &target).await.unwrap();
    assert!(first.generated);
    assert_eq!(first.store_key, "out/cat-10x20.jpg");
    assert_eq!(first.data.as_deref(), Some(&b"Some(10)xSome(20):CAT"[..]));
    assert_eq!(
        f.store.read("out/cat-10x20.jpg").await.unwrap(),
        Bytes::from_static(b"Some(10)xSome(20):CAT")
    );

    let second = f.cache.ensure(&request, &target).await.unwrap();
    assert!(!second.generated);
    assert!(second.data.is_none());
    assert_eq!(f.processor.calls(), 1);
}

#[tokio::test]
async fn test_existing_derivative_is_not_revalidated() {
    let f = fixture();
    f.store.insert("out/ghost-1x1.jpg", "OLD");
    let (request, target) = target(&f, "ghost-1x1.jpg");

    let derivative = f.cache.ensure(&request, &target).await.unwrap();
    assert!(!derivative.generated);
    assert_eq!(f.processor.calls(), 0);
}

#[tokio::test]
async fn test_cap_allows_n_and_rejects_n_plus_one() {
    let f = fixture_with(StubProcessor::new(), capped(3));
    for size in 1..=3 {
        let (request, target) = target(&f, &format!("cat-{}x{}.jpg", size, size));
        f.cache.ensure(&request, &target).await.unwrap();
    }

    let (request, fourth) = target(&f, "cat-4x4.jpg");
    let err = f.cache.ensure(&request, &fourth).await.unwrap_err();
    assert!(matches!(
        err,
        DerivativeError::TooManyDerivatives { count: 3, max: 3, .. }
    ));
    assert!(!f.store.exists("out/cat-4x4.jpg").await.unwrap());

    // Existing derivatives are still served once the cap is reached
    let (request, first) = target(&f, "cat-1x1.jpg");
    assert!(!f.cache.ensure(&request, &first).await.unwrap().generated);
}

#[tokio::test]
async fn test_cap_counts_only_same_source() {
    let f = fixture_with(StubProcessor::new(), capped(1));
    f.store.insert("out/cat-x-1x1.jpg", "other source");
    f.store.insert("out/cat-notes.txt", "not a derivative");
    f.store.insert("out/nested/cat-1x1.jpg", "other directory");

    let (request, target) = target(&f, "cat-5x5.jpg");
    assert!(f.cache.ensure(&request, &target).await.unwrap().generated);

    let (request, dog) = self::target(&f, "dog-5x5.jpg");
    assert!(f.cache.ensure(&request, &dog).await.unwrap().generated);
}

#[tokio::test]
async fn test_zero_cap_disables_limit() {
    let f = fixture_with(StubProcessor::new(), capped(0));
    for size in 1..=5 {
        let (request, target) = target(&f, &format!("cat-{}x_.jpg", size));
        f.cache.ensure(&request, &target).await.unwrap();
    }
    assert_eq!(f.processor.calls(), 5);
}

#[tokio::test]
async fn test_unreadable_source() {
    let f = fixture();
    let (request, target) = target(&f, "missing-10x10.jpg");
    let err = f.cache.ensure(&request, &target).await.unwrap_err();
    assert!(matches!(err, DerivativeError::SourceUnreadable { .. }));
    assert_eq!(err.to_http_status(), 404);
    assert_eq!(f.processor.calls(), 0);
}

#[tokio::test]
async fn test_processing_failure_writes_nothing() {
    let f = fixture_with(StubProcessor::failing(), CacheSettings::default());
    let (request, target) = target(&f, "cat-10x10.jpg");

    let err = f.cache.ensure(&request, &target).await.unwrap_err();
    assert!(matches!(err, DerivativeError::ProcessingFailed(_)));
    assert!(!f.store.exists("out/cat-10x10.jpg").await.unwrap());
}

#[tokio::test]
async fn test_invalid_option_is_processing_failure() {
    let f = fixture();
    let (request, target) = target(&f, "cat-10x10-sepia.jpg");

    let err = f.cache.ensure(&request, &target).await.unwrap_err();
    assert!(matches!(err, DerivativeError::ProcessingFailed(_)));
    assert_eq!(f.processor.calls(), 0);
}

#[tokio::test]
async fn test_store_write_failure() {
    let f = fixture();
    f.store.set_read_only(true);
    let (request, target) = target(&f, "cat-10x10.jpg");

    let err = f.cache.ensure(&request, &target).await.unwrap_err();
    assert!(matches!(
        err,
        DerivativeError::Storage(StorageError::Remote(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_is_processing_failure() {
    let settings = CacheSettings {
        processing_timeout: Duration::from_millis(50),
        ..CacheSettings::default()
    };
    let f = fixture_with(StubProcessor::slow(Duration::from_millis(400)), settings);
    let (request, target) = target(&f, "cat-10x10.jpg");

    let err = f.cache.ensure(&request, &target).await.unwrap_err();
    assert!(matches!(err, DerivativeError::ProcessingFailed(ref m) if m.contains("timed out")));

    // The abandoned job's output is never stored
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!f.store.exists("out/cat-10x10.jpg").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_process_once() {
    let f = fixture_with(
        StubProcessor::slow(Duration::from_millis(100)),
        CacheSettings::default(),
    );
    let (request, target) = target(&f, "cat-10x10.jpg");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = f.cache.clone();
            let request = request.clone();
            let target = target.clone();
            tokio::spawn(async move { cache.ensure(&request, &target).await })
        })
        .collect();

    let mut generated = 0;
    for task in tasks {
        if task.await.unwrap().unwrap().generated {
            generated += 1;
        }
    }
    assert_eq!(generated, 1);
    assert_eq!(f.processor.calls(), 1);
}

#[tokio::test]
async fn test_metrics_are_recorded() {
    let metrics = Arc::new(Metrics::new());
    let store = Arc::new(MemoryStore::new());
    store.insert("cat.jpg", "CAT");
    let cache = DerivativeCache::new(
        store,
        Arc::new(StubProcessor::new()),
        CacheSettings::default(),
    )
    .with_metrics(metrics.clone());

    let mount = Mount::default();
    let request = parse("cat-1x1.jpg").unwrap();
    let target = DerivativeTarget::new(&mount, &request, "cat-1x1.jpg");
    cache.ensure(&request, &target).await.unwrap();
    cache.ensure(&request, &target).await.unwrap();

    assert_eq!(metrics.get_generated_count(), 1);
    assert_eq!(metrics.get_cache_hit_count(), 1);
}
