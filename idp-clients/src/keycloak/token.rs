//! Process-wide cache for the Keycloak management token.

use std::sync::RwLock;
use std::time::{Duration, Instant};

/// How long a fetched management token may be reused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub max_age: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    fetched_at: Instant,
}

/// Holds at most one token together with the instant it was fetched.
///
/// Refreshes are not serialized: two callers that both miss will both fetch,
/// and whichever stores last wins. Both tokens are valid, so this only costs
/// a redundant round trip.
#[derive(Debug, Default)]
pub struct TokenCache {
    policy: TokenPolicy,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(policy: TokenPolicy) -> Self {
        Self {
            policy,
            slot: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Returns the cached token if it is younger than the policy's max age
    pub fn fresh_token(&self) -> Option<String> {
        self.fresh_token_at(Instant::now())
    }

    pub fn fresh_token_at(&self, now: Instant) -> Option<String> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|cached| now.saturating_duration_since(cached.fetched_at) < self.policy.max_age)
            .map(|cached| cached.token.clone())
    }

    pub fn store(&self, token: String) {
        self.store_at(token, Instant::now());
    }

    pub fn store_at(&self, token: String, fetched_at: Instant) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(CachedToken { token, fetched_at });
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}
