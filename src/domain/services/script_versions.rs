#[cfg(test)]
#[path = "script_versions_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;

use crate::domain::models::Script;
use crate::domain::models::SessionStoreRef;

/// The current script set of a session, one file per filename.
pub struct ScriptVersions {
    store: SessionStoreRef,
}

impl ScriptVersions {
    pub fn new(store: SessionStoreRef) -> ScriptVersions {
        return ScriptVersions { store };
    }

    /// Current scripts sorted by filename.
    pub async fn current(&self, session: &str) -> Result<Vec<Script>> {
        let scripts = self
            .store
            .list_scripts(session)
            .await?
            .iter()
            .map(|(filename, body)| return Script::from_rendered(filename, body))
            .collect::<Vec<Script>>();

        return Ok(scripts);
    }

    /// Overwrites each script in order: the old file is deleted, then the
    /// new body is written with a regenerated header. The two steps are not
    /// atomic, a crash in between leaves the filename absent. Later entries
    /// with the same filename win.
    pub async fn save(&self, session: &str, scripts: &[Script]) -> Result<()> {
        for script in scripts.iter() {
            if !Script::is_valid_filename(&script.filename) {
                bail!(format!("Refusing to save script with filename '{}'", script.filename));
            }

            self.store.delete_script(session, &script.filename).await?;
            self.store
                .write_script(session, &script.filename, &script.render())
                .await?;

            tracing::debug!(
                session,
                filename = %script.filename,
                version = script.version,
                "Saved script"
            );
        }

        return Ok(());
    }
}
