use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Barrier;

use super::trim;
use super::Conversation;
use crate::domain::models::ArtifactKind;
use crate::domain::models::HistoryEntry;
use crate::domain::models::SessionStore;
use crate::domain::models::SessionStoreRef;
use crate::domain::models::SessionSummary;
use crate::infrastructure::storage::MemorySessionStore;

fn entry(idx: usize, len: usize) -> HistoryEntry {
    let content = format!("{idx}:{}", "x".repeat(len));
    if idx % 2 == 0 {
        return HistoryEntry::user(&content);
    }
    return HistoryEntry::assistant(&content);
}

fn total_cost(entries: &[HistoryEntry]) -> usize {
    return entries.iter().map(|e| return e.token_cost()).sum();
}

#[test]
fn it_keeps_everything_under_budget() {
    let entries = vec![entry(0, 10), entry(1, 10), entry(2, 10)];
    assert_eq!(trim(entries.clone(), 1000), entries);
}

#[test]
fn it_drops_the_oldest_entries_first() {
    // Each entry costs 10 tokens.
    let entries = (0..5).map(|idx| return entry(idx, 38)).collect::<Vec<_>>();
    let trimmed = trim(entries.clone(), 25);

    assert_eq!(trimmed, entries[3..].to_vec());
}

#[test]
fn it_always_returns_a_suffix_within_budget() {
    for budget in [0, 1, 7, 20, 55, 130, 400] {
        for count in 0..12 {
            let entries = (0..count)
                .map(|idx| return entry(idx, (idx * 37) % 90))
                .collect::<Vec<_>>();
            let trimmed = trim(entries.clone(), budget);

            assert!(total_cost(&trimmed) <= budget);
            assert_eq!(trimmed, entries[entries.len() - trimmed.len()..].to_vec());
        }
    }
}

#[test]
fn it_drops_a_single_entry_larger_than_the_budget() {
    let trimmed = trim(vec![entry(0, 400)], 50);
    assert!(trimmed.is_empty());
}

#[tokio::test]
async fn it_appends_and_persists() -> Result<()> {
    let store: SessionStoreRef = Arc::new(MemorySessionStore::default());
    let conversation = Conversation::new(store.clone(), 1000);

    conversation.append("s1", HistoryEntry::user("hello")).await?;
    let res = conversation
        .append("s1", HistoryEntry::assistant("hi there"))
        .await?;

    assert_eq!(res.len(), 2);
    assert_eq!(store.load_history("s1").await?, res);
    assert!(conversation.load("s2").await?.is_empty());
    return Ok(());
}

#[tokio::test]
async fn it_seeds_only_empty_sessions() -> Result<()> {
    let store: SessionStoreRef = Arc::new(MemorySessionStore::default());
    let conversation = Conversation::new(store, 1000);

    let seeded = conversation
        .seed("s1", vec![HistoryEntry::user("from the client")])
        .await?;
    assert!(seeded);

    let seeded_again = conversation
        .seed("s1", vec![HistoryEntry::user("ignored")])
        .await?;
    assert!(!seeded_again);
    assert_eq!(
        conversation.load("s1").await?,
        vec![HistoryEntry::user("from the client")]
    );
    return Ok(());
}

/// Makes every history read wait until two readers are in flight.
struct InterleavingStore {
    inner: MemorySessionStore,
    barrier: Barrier,
}

#[async_trait]
impl SessionStore for InterleavingStore {
    async fn load_history(&self, session: &str) -> Result<Vec<HistoryEntry>> {
        let res = self.inner.load_history(session).await;
        self.barrier.wait().await;
        return res;
    }

    async fn save_history(&self, session: &str, entries: &[HistoryEntry]) -> Result<()> {
        return self.inner.save_history(session, entries).await;
    }

    async fn list_scripts(&self, session: &str) -> Result<Vec<(String, String)>> {
        return self.inner.list_scripts(session).await;
    }

    async fn delete_script(&self, session: &str, filename: &str) -> Result<()> {
        return self.inner.delete_script(session, filename).await;
    }

    async fn write_script(&self, session: &str, filename: &str, body: &str) -> Result<()> {
        return self.inner.write_script(session, filename, body).await;
    }

    async fn read_artifact(&self, session: &str, kind: ArtifactKind) -> Result<Option<String>> {
        return self.inner.read_artifact(session, kind).await;
    }

    async fn write_artifact(&self, session: &str, kind: ArtifactKind, body: &str) -> Result<()> {
        return self.inner.write_artifact(session, kind, body).await;
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        return self.inner.list_sessions().await;
    }
}

// Unsynchronized overlapping appends lose an update. The pipeline avoids
// this with per session locks, the store itself does not.
#[tokio::test]
async fn it_loses_entries_when_appends_overlap() -> Result<()> {
    let store: SessionStoreRef = Arc::new(InterleavingStore {
        inner: MemorySessionStore::default(),
        barrier: Barrier::new(2),
    });
    let conversation = Conversation::new(store.clone(), 1000);

    let (first, second) = tokio::join!(
        conversation.append("s1", HistoryEntry::user("turn one")),
        conversation.append("s1", HistoryEntry::user("turn two")),
    );
    first?;
    second?;

    let inner_history = store.list_sessions().await?;
    assert_eq!(inner_history.len(), 1);

    let stored = {
        // Reads go through the barrier, pair them up.
        let (a, _b) = tokio::join!(store.load_history("s1"), store.load_history("s1"));
        a?
    };
    assert_eq!(stored.len(), 1);
    return Ok(());
}
