#[cfg(test)]
#[path = "fs_test.rs"]
mod tests;

use std::fs as std_fs;
use std::path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::Local;
use chrono::SecondsFormat;
use fs2::FileExt;
use tokio::fs;

use super::write_atomic;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::is_valid_session_key;
use crate::domain::models::ArtifactKind;
use crate::domain::models::HistoryEntry;
use crate::domain::models::Role;
use crate::domain::models::Script;
use crate::domain::models::SessionLease;
use crate::domain::models::SessionStore;
use crate::domain::models::SessionStoreRef;
use crate::domain::models::SessionSummary;

const HISTORY_FILE: &str = "history.json";
const SCRIPTS_DIR: &str = "scripts";
const LOCK_FILE: &str = ".lock";

/// One directory per session under `root`:
///
/// ```text
/// <root>/<session>/.lock
/// <root>/<session>/history.json
/// <root>/<session>/reply.txt
/// <root>/<session>/graph.json
/// <root>/<session>/descriptions.json
/// <root>/<session>/scripts/<filename>
/// ```
pub struct FsSessionStore {
    pub root: path::PathBuf,
}

impl FsSessionStore {
    pub fn new(root: path::PathBuf) -> FsSessionStore {
        return FsSessionStore { root };
    }

    /// Store rooted at `ConfigKey::SessionsDir`.
    pub fn from_config() -> SessionStoreRef {
        return Arc::new(FsSessionStore::new(path::PathBuf::from(Config::get(
            ConfigKey::SessionsDir,
        ))));
    }

    fn session_dir(&self, session: &str) -> Result<path::PathBuf> {
        if !is_valid_session_key(session) {
            bail!(format!("Invalid session id '{session}'"));
        }

        return Ok(self.root.join(session));
    }

    fn script_path(&self, session: &str, filename: &str) -> Result<path::PathBuf> {
        if !Script::is_valid_filename(filename) {
            bail!(format!("Invalid script filename '{filename}'"));
        }

        return Ok(self.session_dir(session)?.join(SCRIPTS_DIR).join(filename));
    }

    async fn summarize(&self, session: &str) -> Result<SessionSummary> {
        let metadata = fs::metadata(self.session_dir(session)?).await?;
        let timestamp: DateTime<Local> = metadata.modified()?.into();

        let first_message = self
            .load_history(session)
            .await?
            .into_iter()
            .find(|e| return e.role == Role::User)
            .map(|e| return e.content);

        return Ok(SessionSummary {
            id: session.to_string(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Secs, false),
            first_message,
            script_count: self.list_scripts(session).await?.len(),
        });
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    /// Advisory `flock` on `<session>/.lock`, released when the file handle
    /// in the lease is closed.
    async fn lock_session(&self, session: &str) -> Result<SessionLease> {
        let dir = self.session_dir(session)?;
        fs::create_dir_all(&dir).await?;

        let lock_path = dir.join(LOCK_FILE);
        let file = tokio::task::spawn_blocking(move || -> Result<std_fs::File> {
            let file = std_fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(lock_path)?;
            file.lock_exclusive()?;
            return Ok(file);
        })
        .await??;

        return Ok(Box::new(file));
    }

    async fn load_history(&self, session: &str) -> Result<Vec<HistoryEntry>> {
        let file_path = self.session_dir(session)?.join(HISTORY_FILE);
        if !file_path.exists() {
            return Ok(vec![]);
        }

        let payload = fs::read_to_string(file_path).await?;
        let entries: Vec<HistoryEntry> = serde_json::from_str(&payload)?;

        return Ok(entries);
    }

    async fn save_history(&self, session: &str, entries: &[HistoryEntry]) -> Result<()> {
        let file_path = self.session_dir(session)?.join(HISTORY_FILE);
        let payload = serde_json::to_string_pretty(entries)?;

        return write_atomic(&file_path, &payload).await;
    }

    async fn list_scripts(&self, session: &str) -> Result<Vec<(String, String)>> {
        let scripts_dir = self.session_dir(session)?.join(SCRIPTS_DIR);
        let mut scripts: Vec<(String, String)> = vec![];
        if !scripts_dir.exists() {
            return Ok(scripts);
        }

        let mut dir = fs::read_dir(&scripts_dir).await?;
        while let Some(file) = dir.next_entry().await? {
            let filename = file.file_name().to_string_lossy().to_string();
            if !file.file_type().await?.is_file() || !Script::is_valid_filename(&filename) {
                continue;
            }

            let body = fs::read_to_string(file.path()).await?;
            scripts.push((filename, body));
        }

        scripts.sort_by(|a, b| return a.0.cmp(&b.0));

        return Ok(scripts);
    }

    async fn delete_script(&self, session: &str, filename: &str) -> Result<()> {
        let file_path = self.script_path(session, filename)?;
        if !file_path.exists() {
            return Ok(());
        }

        fs::remove_file(file_path).await?;
        return Ok(());
    }

    async fn write_script(&self, session: &str, filename: &str, body: &str) -> Result<()> {
        let file_path = self.script_path(session, filename)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(file_path, body).await?;
        return Ok(());
    }

    async fn read_artifact(&self, session: &str, kind: ArtifactKind) -> Result<Option<String>> {
        let file_path = self.session_dir(session)?.join(kind.file_name());
        if !file_path.exists() {
            return Ok(None);
        }

        return Ok(Some(fs::read_to_string(file_path).await?));
    }

    async fn write_artifact(&self, session: &str, kind: ArtifactKind, body: &str) -> Result<()> {
        let file_path = self.session_dir(session)?.join(kind.file_name());
        return write_atomic(&file_path, body).await;
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions: Vec<SessionSummary> = vec![];
        if !self.root.exists() {
            return Ok(sessions);
        }

        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let id = entry.file_name().to_string_lossy().to_string();
            if !entry.file_type().await?.is_dir() || !is_valid_session_key(&id) {
                continue;
            }

            match self.summarize(&id).await {
                Ok(summary) => sessions.push(summary),
                Err(err) => {
                    tracing::warn!(session = %id, err = ?err, "Skipping unreadable session");
                }
            }
        }

        sessions.sort_by(|a, b| return a.timestamp.cmp(&b.timestamp));

        return Ok(sessions);
    }
}
