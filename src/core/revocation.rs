//! Revoked token tracking.
//!
//! Logout works by revoking the token's unique id (`jti`) rather than the
//! token string itself, so both members of an access/refresh pair can be
//! killed independently. The store sits behind a trait so a persistent
//! backend can replace the in-memory set without touching the handlers.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;

#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn revoke(&self, jti: &str);
    async fn is_revoked(&self, jti: &str) -> bool;
}

/// Process-local revocation set. Cleared on restart, which also invalidates
/// outstanding tokens whenever the JWT secret rotates with the server id.
#[derive(Default)]
pub struct InMemoryRevocationStore {
    revoked: RwLock<HashSet<String>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, jti: &str) {
        self.revoked.write().insert(jti.to_string());
    }

    async fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.read().contains(jti)
    }
}
