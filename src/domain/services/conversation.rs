#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use anyhow::Result;

use crate::domain::models::HistoryEntry;
use crate::domain::models::SessionStoreRef;

/// Keeps the newest entries whose summed token estimate fits the budget.
/// Entries are never split or reordered, so the result is always a suffix.
pub fn trim(entries: Vec<HistoryEntry>, token_budget: usize) -> Vec<HistoryEntry> {
    let mut total = 0;
    let mut keep = 0;
    for entry in entries.iter().rev() {
        let cost = entry.token_cost();
        if total + cost > token_budget {
            break;
        }
        total += cost;
        keep += 1;
    }

    let drop = entries.len() - keep;
    if drop > 0 {
        tracing::debug!(dropped = drop, kept = keep, "Trimmed conversation history");
    }

    return entries.into_iter().skip(drop).collect();
}

/// Append-only, token bounded history per session.
///
/// Every append is a read-modify-write of the whole log with no locking.
/// Two overlapping turns on one session lose entries, callers serialize
/// turns through `SessionLocks`.
pub struct Conversation {
    store: SessionStoreRef,
    token_budget: usize,
}

impl Conversation {
    pub fn new(store: SessionStoreRef, token_budget: usize) -> Conversation {
        return Conversation {
            store,
            token_budget,
        };
    }

    pub async fn load(&self, session: &str) -> Result<Vec<HistoryEntry>> {
        return self.store.load_history(session).await;
    }

    pub async fn append(&self, session: &str, entry: HistoryEntry) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.store.load_history(session).await?;
        entries.push(entry);

        let trimmed = trim(entries, self.token_budget);
        self.store.save_history(session, &trimmed).await?;

        return Ok(trimmed);
    }

    /// Stores a caller supplied history for a session that has none yet.
    /// Returns false and leaves the stored log alone otherwise.
    pub async fn seed(&self, session: &str, entries: Vec<HistoryEntry>) -> Result<bool> {
        if entries.is_empty() || !self.store.load_history(session).await?.is_empty() {
            return Ok(false);
        }

        let trimmed = trim(entries, self.token_budget);
        self.store.save_history(session, &trimmed).await?;

        return Ok(true);
    }
}
