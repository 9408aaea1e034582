use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use super::source::MembershipSource;
use crate::error::{MergeGraphError, Result};
use crate::metrics::{default_metrics, MergeGraphMetrics};
use crate::types::{BodyId, MembershipSet};

/// Default number of membership sets retained by a [`MembershipCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Version marker distinguishing successive memberships of one body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Generation {
    /// No token available. Entries keyed this way are only ever replaced by
    /// eviction or explicit invalidation, so upstream edits go unnoticed.
    Unversioned,
    /// Mutation id reported by the segmentation service.
    Mutation(u64),
}

impl From<Option<u64>> for Generation {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Generation::Unversioned, Generation::Mutation)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Unversioned => f.write_str("unversioned"),
            Generation::Mutation(id) => write!(f, "mutation:{id}"),
        }
    }
}

/// Identity of one memoized membership query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Address of the segmentation service.
    pub source: String,
    /// Version (node uuid) queried.
    pub version: String,
    /// Segmentation instance name.
    pub instance: String,
    /// Body queried.
    pub body: BodyId,
    /// Mutation token supplied by the caller.
    pub generation: Generation,
}

impl CacheKey {
    /// Builds a key from its parts.
    pub fn new(
        source: impl Into<String>,
        version: impl Into<String>,
        instance: impl Into<String>,
        body: BodyId,
        generation: Generation,
    ) -> Self {
        Self {
            source: source.into(),
            version: version.into(),
            instance: instance.into(),
            body,
            generation,
        }
    }
}

type Flight = Arc<Mutex<()>>;

/// Bounded, single-flight memo of membership queries.
///
/// A miss calls the [`MembershipSource`] while holding a per-key flight lock,
/// so concurrent misses for one key produce a single fetch; callers that
/// queued behind it read the stored result. Distinct keys fetch in parallel.
/// Failed fetches are never stored.
pub struct MembershipCache {
    source: Arc<dyn MembershipSource>,
    entries: Mutex<LruCache<CacheKey, MembershipSet>>,
    flights: Mutex<FxHashMap<CacheKey, Flight>>,
    metrics: Arc<dyn MergeGraphMetrics>,
}

impl MembershipCache {
    /// Creates a cache holding at most `capacity` sets (minimum one).
    pub fn new(source: Arc<dyn MembershipSource>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            entries: Mutex::new(LruCache::new(capacity)),
            flights: Mutex::new(FxHashMap::default()),
            metrics: default_metrics(),
        }
    }

    /// Replaces the metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn MergeGraphMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the members for `key`, fetching them on a miss.
    pub fn get_members(&self, key: &CacheKey) -> Result<MembershipSet> {
        let cached = self.entries.lock().get(key).cloned();
        if let Some(hit) = cached {
            self.metrics.cache_hit();
            return Ok(hit);
        }
        self.metrics.cache_miss();
        if key.generation == Generation::Unversioned {
            debug!(body = key.body.0, version = %key.version, "membership_cache.key.unversioned");
        }

        let flight = self
            .flights
            .lock()
            .entry(key.clone())
            .or_insert_with(Flight::default)
            .clone();
        let result = {
            let _leader = flight.lock();
            let filled = self.entries.lock().get(key).cloned();
            match filled {
                Some(filled) => {
                    debug!(body = key.body.0, "membership_cache.flight.coalesced");
                    Ok(filled)
                }
                None => self.fetch_and_store(key),
            }
        };
        self.release_flight(key, &flight);
        result
    }

    fn fetch_and_store(&self, key: &CacheKey) -> Result<MembershipSet> {
        let start = Instant::now();
        let fetched =
            self.source
                .fetch_members(&key.source, &key.version, &key.instance, key.body);
        let duration_ms = start.elapsed().as_secs_f64() * 1_000.0;
        match fetched {
            Ok(ids) => {
                self.metrics.membership_fetch(true);
                let members = MembershipSet::from_unsorted(ids);
                info!(
                    body = key.body.0,
                    version = %key.version,
                    instance = %key.instance,
                    generation = %key.generation,
                    members = members.len(),
                    duration_ms,
                    "membership_cache.fetch.complete"
                );
                self.entries.lock().put(key.clone(), members.clone());
                Ok(members)
            }
            Err(err) => {
                self.metrics.membership_fetch(false);
                warn!(
                    body = key.body.0,
                    version = %key.version,
                    error = %err,
                    duration_ms,
                    "membership_cache.fetch.failed"
                );
                Err(MergeGraphError::from_fetch(key.body, err))
            }
        }
    }

    fn release_flight(&self, key: &CacheKey, flight: &Flight) {
        let mut flights = self.flights.lock();
        let idle = flights
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, flight) && Arc::strong_count(flight) == 2);
        if idle {
            flights.remove(key);
        }
    }

    /// Returns the stored members for `key` without fetching or touching recency.
    pub fn peek(&self, key: &CacheKey) -> Option<MembershipSet> {
        self.entries.lock().peek(key).cloned()
    }

    /// Drops the entry for `key`. Returns true if one was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of stored entries.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}
