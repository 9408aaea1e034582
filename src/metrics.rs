//! Counters describing cache and extraction activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking cache and extraction activity of the merge-graph engine.
///
/// Implementations collect counts of membership cache traffic, fast-path hits,
/// full-table scans and index repairs. The engine calls these from whichever
/// thread serves the request, so implementations must be thread-safe.
pub trait MergeGraphMetrics: Send + Sync {
    /// Records a membership lookup served from the cache.
    fn cache_hit(&self);

    /// Records a membership lookup that missed the cache.
    fn cache_miss(&self);

    /// Records a completed fetch from the membership source.
    ///
    /// # Parameters
    /// * `ok` - Whether the fetch produced a member list (`true`) or failed (`false`).
    fn membership_fetch(&self, ok: bool);

    /// Records an extraction answered from the `body` column alone.
    fn fast_path_hit(&self);

    /// Records an extraction that required a full-table scan.
    fn slow_path_scan(&self);

    /// Records the outcome of the repair step after a slow-path scan.
    ///
    /// # Parameters
    /// * `applied` - `true` if the `body` column was rewritten, `false` if skipped.
    fn repair(&self, applied: bool);
}

/// A no-op implementation of [`MergeGraphMetrics`] that discards everything.
#[derive(Default)]
pub struct NoopMetrics;

impl MergeGraphMetrics for NoopMetrics {
    fn cache_hit(&self) {}
    fn cache_miss(&self) {}
    fn membership_fetch(&self, _ok: bool) {}
    fn fast_path_hit(&self) {}
    fn slow_path_scan(&self) {}
    fn repair(&self, _applied: bool) {}
}

/// A thread-safe counter-based implementation of [`MergeGraphMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Membership lookups served from the cache.
    pub cache_hits: AtomicU64,

    /// Membership lookups that missed the cache.
    pub cache_misses: AtomicU64,

    /// Successful fetches from the membership source.
    pub fetches: AtomicU64,

    /// Failed fetches from the membership source.
    pub fetch_failures: AtomicU64,

    /// Extractions served by the fast path.
    pub fast_path_hits: AtomicU64,

    /// Extractions that scanned the whole table.
    pub slow_path_scans: AtomicU64,

    /// Repairs written to the `body` column.
    pub repairs_applied: AtomicU64,

    /// Repairs skipped because the version was not the primary one.
    pub repairs_skipped: AtomicU64,
}

impl CounterMetrics {
    /// Fraction of membership lookups that hit the cache, or `0.0` if none were made.
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let total = hits + self.cache_misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl MergeGraphMetrics for CounterMetrics {
    fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn membership_fetch(&self, ok: bool) {
        if ok {
            self.fetches.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn fast_path_hit(&self) {
        self.fast_path_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn slow_path_scan(&self) {
        self.slow_path_scans.fetch_add(1, Ordering::Relaxed);
    }

    fn repair(&self, applied: bool) {
        if applied {
            self.repairs_applied.fetch_add(1, Ordering::Relaxed);
        } else {
            self.repairs_skipped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Returns the default metrics implementation, [`NoopMetrics`], wrapped in an [`Arc`].
pub fn default_metrics() -> Arc<dyn MergeGraphMetrics> {
    Arc::new(NoopMetrics)
}
