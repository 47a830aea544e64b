#[cfg(test)]
#[path = "publisher_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;

use crate::domain::models::ArtifactKind;
use crate::domain::models::DescriptionSet;
use crate::domain::models::Graph;
use crate::domain::models::MirrorLayout;
use crate::domain::models::PublishReport;
use crate::domain::models::SessionStoreRef;
use crate::infrastructure::storage::write_atomic;

/// Writes the graph and description documents into the session, then
/// copies the stored documents into the mirror directory an external reader
/// polls. The session copies are authoritative, the mirror is best effort.
pub struct ArtifactPublisher {
    store: SessionStoreRef,
    mirror_dir: Option<path::PathBuf>,
    layout: MirrorLayout,
}

impl ArtifactPublisher {
    pub fn new(
        store: SessionStoreRef,
        mirror_dir: Option<path::PathBuf>,
        layout: MirrorLayout,
    ) -> ArtifactPublisher {
        return ArtifactPublisher {
            store,
            mirror_dir,
            layout,
        };
    }

    pub fn mirror_path(&self, session: &str, kind: ArtifactKind) -> Option<path::PathBuf> {
        let dir = self.mirror_dir.as_ref()?;
        let res = match self.layout {
            MirrorLayout::Shared => dir.join(kind.file_name()),
            MirrorLayout::Session => dir.join(session).join(kind.file_name()),
        };

        return Some(res);
    }

    async fn write_session_copy(
        &self,
        session: &str,
        kind: ArtifactKind,
        body: Result<String>,
    ) -> Result<()> {
        return self.store.write_artifact(session, kind, &body?).await;
    }

    async fn mirror(&self, session: &str, kind: ArtifactKind, target: &path::Path) -> Result<()> {
        let body = match self.store.read_artifact(session, kind).await? {
            Some(body) => body,
            None => bail!(format!("Session has no {} to mirror", kind.file_name())),
        };

        return write_atomic(target, &body).await;
    }

    /// Never fails. Every document that could not be written or mirrored is
    /// listed in the report's failures.
    pub async fn publish(
        &self,
        session: &str,
        graph: &Graph,
        descriptions: Option<&DescriptionSet>,
    ) -> PublishReport {
        let mut report = PublishReport::default();

        let mut documents = vec![(
            ArtifactKind::Graph,
            serde_json::to_string_pretty(graph).map_err(anyhow::Error::from),
        )];
        if let Some(descriptions) = descriptions {
            documents.push((
                ArtifactKind::Descriptions,
                serde_json::to_string_pretty(descriptions).map_err(anyhow::Error::from),
            ));
        }

        for (kind, body) in documents {
            match self.write_session_copy(session, kind, body).await {
                Ok(_) => report.session_written.push(kind.file_name().to_string()),
                Err(err) => {
                    tracing::error!(session, file = kind.file_name(), err = ?err, "Failed to write artifact");
                    report
                        .failures
                        .push(format!("{}: {err}", kind.file_name()));
                }
            }
        }

        for kind in [ArtifactKind::Graph, ArtifactKind::Descriptions] {
            let target = match self.mirror_path(session, kind) {
                Some(target) => target,
                None => continue,
            };

            let target_str = target.to_string_lossy().to_string();
            match self.mirror(session, kind, &target).await {
                Ok(_) => report.mirrored.push(target_str),
                Err(err) => {
                    tracing::warn!(session, target = %target_str, err = ?err, "Failed to mirror artifact");
                    report.failures.push(format!("{target_str}: {err}"));
                }
            }
        }

        return report;
    }
}
