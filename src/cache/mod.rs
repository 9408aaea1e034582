//! Memoized access to the external body-membership authority.

mod membership;
mod source;

pub use membership::{CacheKey, Generation, MembershipCache, DEFAULT_CACHE_CAPACITY};
pub use source::{FetchError, InMemoryMembership, MembershipSource};
