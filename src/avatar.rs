//! Shared current-avatar state
//!
//! Thread-safe cell holding the last-known avatar identity. The change
//! listener is the only writer; everything else reads.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::info;

/// Process-wide current avatar identity
///
/// Uses RwLock for concurrent read access with rare writes.
pub struct AvatarState {
    /// Last-known avatar identity (None until seeded)
    current: RwLock<Option<String>>,

    /// Count of observed identity transitions, for monitoring
    transitions: AtomicU64,
}

impl AvatarState {
    /// Create an unseeded state
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            transitions: AtomicU64::new(0),
        }
    }

    /// Non-blocking read of the current identity
    pub async fn current(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Record a change notification
    ///
    /// Identical-identity notifications are no-ops; the transport does not
    /// deduplicate deliveries. Returns whether a transition occurred.
    pub async fn observe(&self, identity: &str) -> bool {
        {
            let current = self.current.read().await;
            if current.as_deref() == Some(identity) {
                return false;
            }
        }

        let mut current = self.current.write().await;
        // Re-check under the write lock; a concurrent observe may have won
        if current.as_deref() == Some(identity) {
            return false;
        }
        *current = Some(identity.to_string());
        self.transitions.fetch_add(1, Ordering::Relaxed);
        info!("Avatar changed to {identity}");
        true
    }

    /// Number of identity transitions since startup
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }
}

impl Default for AvatarState {
    fn default() -> Self {
        Self::new()
    }
}
