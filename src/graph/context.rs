use crate::cache::{CacheKey, Generation};
use crate::types::BodyId;

/// Where and at which version a body is being queried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionContext {
    /// Address of the segmentation service.
    pub source: String,
    /// Version (node uuid) of the segmentation.
    pub version: String,
    /// Segmentation instance name.
    pub instance: String,
    /// Mutation token for the queried body, if the service reported one.
    pub generation: Generation,
}

impl VersionContext {
    /// Creates an unversioned context.
    pub fn new(
        source: impl Into<String>,
        version: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            version: version.into(),
            instance: instance.into(),
            generation: Generation::Unversioned,
        }
    }

    /// Attaches the body's current mutation id.
    pub fn with_mutation(mut self, mutation_id: u64) -> Self {
        self.generation = Generation::Mutation(mutation_id);
        self
    }

    /// Key under which this context's membership of `body` is memoized.
    pub fn cache_key(&self, body: BodyId) -> CacheKey {
        CacheKey::new(
            self.source.clone(),
            self.version.clone(),
            self.instance.clone(),
            body,
            self.generation,
        )
    }
}

/// Compares two version uuids, accepting abbreviations.
///
/// Uuids match when the shorter is a prefix of the longer. Empty uuids never match.
pub fn versions_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let n = a.len().min(b.len());
    a.as_bytes()[..n] == b.as_bytes()[..n]
}
