//! Assertion replay prevention
//!
//! Opt-in. When enabled, every assertion exchanged for a token is remembered
//! until it would have expired anyway, and a second exchange is rejected.
//! Entries are keyed by the SHA-256 of the signature bytes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use sha2::{Digest, Sha256};

use super::error::AuthError;

/// Tracks consumed assertions
#[async_trait]
pub trait ReplayGuard: Send + Sync {
    /// Record `signature` as consumed for `remaining`, failing if it already was
    async fn check_and_mark(&self, signature: &[u8], remaining: Duration) -> Result<(), AuthError>;
}

/// Per-entry expiry: the value is the absolute instant the assertion expires
struct AssertionExpiry;

impl moka::Expiry<[u8; 32], Instant> for AssertionExpiry {
    fn expire_after_create(
        &self,
        _key: &[u8; 32],
        value: &Instant,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.saturating_duration_since(created_at))
    }
}

/// In-memory replay guard backed by a [`moka::future::Cache`]
///
/// Capacity-bounded with LRU eviction on top of per-entry expiry.
pub struct InMemoryReplayGuard {
    seen: Cache<[u8; 32], Instant>,
}

impl InMemoryReplayGuard {
    pub fn new(max_capacity: u64) -> Self {
        let seen = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(AssertionExpiry)
            .build();
        Self { seen }
    }
}

#[async_trait]
impl ReplayGuard for InMemoryReplayGuard {
    async fn check_and_mark(&self, signature: &[u8], remaining: Duration) -> Result<(), AuthError> {
        let key: [u8; 32] = Sha256::digest(signature).into();
        let expires = Instant::now() + remaining;

        // entry() is atomic: of two concurrent callers only one sees a fresh entry
        let entry = self.seen.entry(key).or_insert(expires).await;
        if entry.is_fresh() {
            Ok(())
        } else {
            Err(AuthError::AssertionReplayed)
        }
    }
}
