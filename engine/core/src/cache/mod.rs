//! Sprite Resource Cache
//!
//! Tracks which asset locators have finished their decode probe, so the
//! animation scheduler knows when a frame set is safe to show.
//!
//! # Design
//!
//! - **Monotonic**: a URL enters the loaded set once and never leaves; it is
//!   never probed again
//! - **Settle, don't fail**: a broken asset settles just like a good one (and
//!   is logged), so a bad custom sprite path can never wedge the renderer on
//!   its loading indicator
//! - **One probe per URL**: duplicate URLs within a batch and overlapping
//!   batches share a single in-flight probe
//!
//! ```text
//! preload(["a", "a", "b"])          preload(["b", "c"])
//!        │                                 │
//!        ├── probe("a") ──────┐            │
//!        └── probe("b") ──┐   │            ├── (joins in-flight "b")
//!                         │   │            └── probe("c")
//!                         ▼   ▼
//!                    loaded set {a, b, c}
//! ```

mod probe;

pub use probe::{FsImageProbe, ImageProbe, ProbeError};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type ProbeFuture = Shared<BoxFuture<'static, ()>>;

struct CacheInner {
    probe: Arc<dyn ImageProbe>,
    loaded: DashSet<String>,
    broken: DashSet<String>,
    in_flight: Mutex<HashMap<String, ProbeFuture>>,
    active_batches: AtomicUsize,
}

impl CacheInner {
    fn settle(&self, url: &str, outcome: Result<(), ProbeError>) {
        if let Err(e) = outcome {
            tracing::warn!(url, error = %e, "Failed to preload image");
            self.broken.insert(url.to_string());
        }

        let mut in_flight = self.in_flight.lock();
        self.loaded.insert(url.to_string());
        in_flight.remove(url);
    }
}

/// Cache of settled sprite assets
///
/// Cheap to clone; clones share the same loaded set.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("loaded", &self.inner.loaded.len())
            .field("broken", &self.inner.broken.len())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .finish()
    }
}

impl ResourceCache {
    /// Create a cache that probes through `probe`
    pub fn new(probe: Arc<dyn ImageProbe>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                probe,
                loaded: DashSet::new(),
                broken: DashSet::new(),
                in_flight: Mutex::new(HashMap::new()),
                active_batches: AtomicUsize::new(0),
            }),
        }
    }

    /// Probe every URL not yet settled; resolves when the whole batch has
    ///
    /// Never fails. Already-loaded URLs resolve immediately.
    pub async fn preload<S: AsRef<str>>(&self, urls: &[S]) {
        let _batch = BatchGuard::enter(&self.inner.active_batches);

        let mut seen = HashSet::new();
        let waits: Vec<ProbeFuture> = urls
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|url| !self.inner.loaded.contains(*url))
            .filter(|url| seen.insert(*url))
            .filter_map(|url| self.probe_once(url))
            .collect();

        if !waits.is_empty() {
            tracing::debug!(count = waits.len(), "Preloading sprite assets");
        }
        join_all(waits).await;
    }

    /// Shared probe future for `url`, or `None` if it settled meanwhile
    fn probe_once(&self, url: &str) -> Option<ProbeFuture> {
        let mut in_flight = self.inner.in_flight.lock();

        // Re-check under the lock: settle() inserts and removes under it too.
        if self.inner.loaded.contains(url) {
            return None;
        }
        if let Some(existing) = in_flight.get(url) {
            return Some(existing.clone());
        }

        let inner = Arc::clone(&self.inner);
        let owned = url.to_string();
        let future = async move {
            let outcome = inner.probe.probe(&owned).await;
            inner.settle(&owned, outcome);
        }
        .boxed()
        .shared();

        in_flight.insert(url.to_string(), future.clone());
        Some(future)
    }

    /// Whether `url` has settled
    #[must_use]
    pub fn is_loaded(&self, url: &str) -> bool {
        self.inner.loaded.contains(url)
    }

    /// Whether every URL in `urls` has settled
    #[must_use]
    pub fn all_loaded<S: AsRef<str>>(&self, urls: &[S]) -> bool {
        urls.iter().all(|url| self.is_loaded(url.as_ref()))
    }

    /// Whether `url` settled with a failed probe
    #[must_use]
    pub fn is_broken(&self, url: &str) -> bool {
        self.inner.broken.contains(url)
    }

    /// Whether any preload batch is still running
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.active_batches.load(Ordering::Acquire) > 0
    }

    /// Number of settled URLs
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.inner.loaded.len()
    }
}

/// Keeps the active batch counter accurate even if a preload is dropped
struct BatchGuard<'a>(&'a AtomicUsize);

impl<'a> BatchGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
