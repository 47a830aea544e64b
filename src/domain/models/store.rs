use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::ArtifactKind;
use super::HistoryEntry;
use super::SessionSummary;

/// Held for the length of a turn. Dropping it releases the session.
pub type SessionLease = Box<dyn Any + Send + Sync>;

/// Storage for everything a session owns: the history log, the current
/// script bodies and the reply/graph/description documents. Individual
/// operations do no locking, callers take `lock_session` around a turn.
#[async_trait]
pub trait SessionStore {
    /// Exclusive hold on a session across every process sharing this
    /// storage. Stores private to one process hold nothing.
    async fn lock_session(&self, _session: &str) -> Result<SessionLease> {
        return Ok(Box::new(()));
    }

    /// Returns an empty log for unknown sessions.
    async fn load_history(&self, session: &str) -> Result<Vec<HistoryEntry>>;

    /// Replaces the whole log.
    async fn save_history(&self, session: &str, entries: &[HistoryEntry]) -> Result<()>;

    /// `(filename, body)` pairs sorted by filename.
    async fn list_scripts(&self, session: &str) -> Result<Vec<(String, String)>>;

    /// Deleting a script that does not exist is not an error.
    async fn delete_script(&self, session: &str, filename: &str) -> Result<()>;

    async fn write_script(&self, session: &str, filename: &str, body: &str) -> Result<()>;

    async fn read_artifact(&self, session: &str, kind: ArtifactKind) -> Result<Option<String>>;

    async fn write_artifact(&self, session: &str, kind: ArtifactKind, body: &str) -> Result<()>;

    /// Oldest first.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;
}

pub type SessionStoreRef = Arc<dyn SessionStore + Send + Sync>;
