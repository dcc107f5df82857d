//! Live-session registry
//!
//! Every live render session is registered here so one stop call can force
//! terminate all of them at once. Registration, deregistration, and the
//! terminate sweep all take the same lock; a worker's own cleanup can never
//! race the sweep into touching a session twice.
//!
//! The registry only holds cancellation handles. Ownership of the session
//! itself stays with the worker that created it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Shared registry of live render sessions
pub struct SessionRegistry {
    sessions: Mutex<HashMap<u64, CancellationToken>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new session and returns its guard.
    ///
    /// The guard deregisters on drop, so a session can never outlive its
    /// registry entry.
    pub fn register(self: &Arc<Self>) -> SessionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.guard().insert(id, token.clone());

        SessionGuard {
            registry: Arc::clone(self),
            id,
            token,
        }
    }

    /// Force-terminates every live session.
    ///
    /// Safe to call repeatedly and from any thread; already-terminated or
    /// already-deregistered sessions are skipped naturally.
    pub fn terminate_all(&self) {
        let mut sessions = self.guard();
        if !sessions.is_empty() {
            tracing::info!("Force-terminating {} live render sessions", sessions.len());
        }
        for (_, token) in sessions.drain() {
            token.cancel();
        }
    }

    /// Number of currently registered sessions
    pub fn live_sessions(&self) -> usize {
        self.guard().len()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<u64, CancellationToken>> {
        // Nothing held across a panic can leave the map half-updated.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration handle for one live session
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: u64,
    token: CancellationToken,
}

impl SessionGuard {
    /// Runs `fut` unless this session is force-terminated first.
    ///
    /// Returns `None` when a terminate sweep fired; the future is dropped at
    /// its current suspension point, which cancels any in-flight request.
    pub async fn run<T>(&self, fut: impl Future<Output = T> + Send) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            value = fut => Some(value),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // The entry may already be gone if a sweep drained the map first.
        self.registry.guard().remove(&self.id);
    }
}
