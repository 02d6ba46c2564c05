//! The artifact store abstraction and TTL policy.

use std::time::Duration;

use async_trait::async_trait;

use crate::Error;
use crate::artifact::Artifact;

/// Key-value store for computed artifacts.
///
/// Implementations evaluate expiration themselves: an expired entry reads
/// as absent and may be replaced by the next `put`.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Look up a live artifact by normalized key.
    ///
    /// `Ok(None)` is a miss. Callers treat errors as misses too.
    async fn get(&self, key: &str) -> Result<Option<Artifact>, Error>;

    /// Store `artifact` under `key` only if no live entry exists.
    ///
    /// Returns `true` when this call created the entry, `false` when an
    /// existing entry was left untouched.
    async fn put(&self, key: &str, artifact: &Artifact, ttl: Duration) -> Result<bool, Error>;
}

/// Chooses how long an artifact stays cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Lifetime of artifacts that carry a thumbnail.
    pub positive: Duration,
    /// Lifetime of artifacts without one.
    pub negative: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self { positive: Duration::from_secs(24 * 60 * 60), negative: Duration::from_secs(60) }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, artifact: &Artifact) -> Duration {
        if artifact.has_thumbnail() { self.positive } else { self.negative }
    }
}

impl From<&crate::config::AppConfig> for TtlPolicy {
    fn from(config: &crate::config::AppConfig) -> Self {
        Self { positive: config.cache_ttl(), negative: config.negative_ttl() }
    }
}
