#[cfg(test)]
#[path = "session_locks_test.rs"]
mod tests;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

/// One async mutex per session key. Turns on different sessions run freely,
/// turns on the same session queue up behind each other.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Releases the session on drop, and forgets its mutex when nobody else is
/// waiting on it.
pub struct SessionGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    session: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // The owned guard keeps its own reference to the mutex.
        drop(self.guard.take());
        self.locks.remove_if(&self.session, |_, lock| {
            return Arc::strong_count(lock) == 1;
        });
    }
}

impl SessionLocks {
    pub async fn acquire(&self, session: &str) -> SessionGuard<'_> {
        let lock = self
            .locks
            .entry(session.to_string())
            .or_insert_with(|| return Arc::new(Mutex::new(())))
            .clone();

        return SessionGuard {
            locks: &self.locks,
            session: session.to_string(),
            guard: Some(lock.lock_owned().await),
        };
    }
}
