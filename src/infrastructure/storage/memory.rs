use std::collections::BTreeMap;
use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use chrono::SecondsFormat;
use dashmap::DashMap;

use crate::domain::models::ArtifactKind;
use crate::domain::models::HistoryEntry;
use crate::domain::models::Role;
use crate::domain::models::SessionStore;
use crate::domain::models::SessionSummary;

#[derive(Clone)]
struct MemorySession {
    created: String,
    history: Vec<HistoryEntry>,
    scripts: BTreeMap<String, String>,
    artifacts: HashMap<ArtifactKind, String>,
}

impl Default for MemorySession {
    fn default() -> MemorySession {
        return MemorySession {
            created: Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            history: vec![],
            scripts: BTreeMap::new(),
            artifacts: HashMap::new(),
        };
    }
}

/// Process local store that never touches the disk.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, MemorySession>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_history(&self, session: &str) -> Result<Vec<HistoryEntry>> {
        let history = self
            .sessions
            .get(session)
            .map(|e| return e.history.clone())
            .unwrap_or_default();

        return Ok(history);
    }

    async fn save_history(&self, session: &str, entries: &[HistoryEntry]) -> Result<()> {
        self.sessions
            .entry(session.to_string())
            .or_default()
            .history = entries.to_vec();

        return Ok(());
    }

    async fn list_scripts(&self, session: &str) -> Result<Vec<(String, String)>> {
        let scripts = self
            .sessions
            .get(session)
            .map(|e| {
                return e
                    .scripts
                    .iter()
                    .map(|(name, body)| return (name.to_string(), body.to_string()))
                    .collect::<Vec<(String, String)>>();
            })
            .unwrap_or_default();

        return Ok(scripts);
    }

    async fn delete_script(&self, session: &str, filename: &str) -> Result<()> {
        if let Some(mut e) = self.sessions.get_mut(session) {
            e.scripts.remove(filename);
        }

        return Ok(());
    }

    async fn write_script(&self, session: &str, filename: &str, body: &str) -> Result<()> {
        self.sessions
            .entry(session.to_string())
            .or_default()
            .scripts
            .insert(filename.to_string(), body.to_string());

        return Ok(());
    }

    async fn read_artifact(&self, session: &str, kind: ArtifactKind) -> Result<Option<String>> {
        let body = self
            .sessions
            .get(session)
            .and_then(|e| return e.artifacts.get(&kind).cloned());

        return Ok(body);
    }

    async fn write_artifact(&self, session: &str, kind: ArtifactKind, body: &str) -> Result<()> {
        self.sessions
            .entry(session.to_string())
            .or_default()
            .artifacts
            .insert(kind, body.to_string());

        return Ok(());
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions = self
            .sessions
            .iter()
            .map(|e| {
                return SessionSummary {
                    id: e.key().to_string(),
                    timestamp: e.created.to_string(),
                    first_message: e
                        .history
                        .iter()
                        .find(|entry| return entry.role == Role::User)
                        .map(|entry| return entry.content.to_string()),
                    script_count: e.scripts.len(),
                };
            })
            .collect::<Vec<SessionSummary>>();

        sessions.sort_by(|a, b| return a.timestamp.cmp(&b.timestamp));

        return Ok(sessions);
    }
}
