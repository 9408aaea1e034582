use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::types::{BodyId, SupervoxelId};

/// Failure kinds reported by a [`MembershipSource`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The body does not exist at the requested version.
    #[error("body not found")]
    NotFound,
    /// Transport or service failure.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// The fetch was cancelled before completing.
    #[error("fetch cancelled")]
    Cancelled,
}

/// External authority on which supervoxels belong to a body.
///
/// Implementations wrap the segmentation service client. Calls block until
/// a member list or an error is available.
pub trait MembershipSource: Send + Sync {
    /// Returns the supervoxels of `body` in `instance` at `version` on `source`.
    fn fetch_members(
        &self,
        source: &str,
        version: &str,
        instance: &str,
        body: BodyId,
    ) -> Result<Vec<SupervoxelId>, FetchError>;
}

/// In-process [`MembershipSource`] backed by a map, with fetch accounting.
///
/// Membership can be defined for all versions or overridden for one version.
/// Failures can be injected per body. Useful for embedding the engine without
/// a live segmentation service and for exercising it in tests.
#[derive(Default)]
pub struct InMemoryMembership {
    bodies: RwLock<FxHashMap<BodyId, Vec<SupervoxelId>>>,
    versioned: RwLock<FxHashMap<(String, BodyId), Vec<SupervoxelId>>>,
    failures: RwLock<FxHashMap<BodyId, FetchError>>,
    fetches: Mutex<FxHashMap<BodyId, u64>>,
    latency: Option<Duration>,
}

impl InMemoryMembership {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every fetch by `latency`, emulating a slow service.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Defines the members of `body` for every version.
    pub fn set_members(&self, body: BodyId, members: impl IntoIterator<Item = u64>) {
        self.bodies
            .write()
            .insert(body, members.into_iter().map(SupervoxelId).collect());
    }

    /// Defines the members of `body` at `version` only, taking precedence
    /// over [`Self::set_members`].
    pub fn set_members_at(
        &self,
        version: &str,
        body: BodyId,
        members: impl IntoIterator<Item = u64>,
    ) {
        self.versioned.write().insert(
            (version.to_string(), body),
            members.into_iter().map(SupervoxelId).collect(),
        );
    }

    /// Removes `body` from every version.
    pub fn remove_body(&self, body: BodyId) {
        self.bodies.write().remove(&body);
        self.versioned.write().retain(|(_, b), _| *b != body);
    }

    /// Makes every fetch of `body` fail with `err` until cleared with `None`.
    pub fn set_failure(&self, body: BodyId, err: Option<FetchError>) {
        let mut failures = self.failures.write();
        match err {
            Some(err) => {
                failures.insert(body, err);
            }
            None => {
                failures.remove(&body);
            }
        }
    }

    /// Number of fetches made for `body`, including failed ones.
    pub fn fetch_count(&self, body: BodyId) -> u64 {
        self.fetches.lock().get(&body).copied().unwrap_or(0)
    }

    /// Number of fetches made across all bodies.
    pub fn total_fetches(&self) -> u64 {
        self.fetches.lock().values().sum()
    }
}

impl MembershipSource for InMemoryMembership {
    fn fetch_members(
        &self,
        _source: &str,
        version: &str,
        _instance: &str,
        body: BodyId,
    ) -> Result<Vec<SupervoxelId>, FetchError> {
        *self.fetches.lock().entry(body).or_insert(0) += 1;
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
        if let Some(err) = self.failures.read().get(&body) {
            return Err(err.clone());
        }
        if let Some(members) = self.versioned.read().get(&(version.to_string(), body)) {
            return Ok(members.clone());
        }
        self.bodies
            .read()
            .get(&body)
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}
