#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;

use std::path;

use anyhow::Result;

use super::ArtifactPublisher;
use super::Conversation;
use super::DescriptionSynthesizer;
use super::GraphSynthesizer;
use super::Orchestrator;
use super::ScriptVersions;
use super::SessionLocks;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::is_valid_session_key;
use crate::domain::models::ArtifactKind;
use crate::domain::models::BackendRef;
use crate::domain::models::Graph;
use crate::domain::models::HistoryEntry;
use crate::domain::models::MirrorLayout;
use crate::domain::models::SessionStoreRef;
use crate::domain::models::TurnError;
use crate::domain::models::TurnResponse;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::storage::FsSessionStore;

pub struct PipelineOptions {
    pub token_budget: usize,
    pub mirror_dir: Option<path::PathBuf>,
    pub mirror_layout: MirrorLayout,
}

impl Default for PipelineOptions {
    fn default() -> PipelineOptions {
        return PipelineOptions {
            token_budget: 3000,
            mirror_dir: None,
            mirror_layout: MirrorLayout::Shared,
        };
    }
}

/// Runs whole turns: generation, script persistence, graph and description
/// synthesis, publication. Only one turn per session is in flight at a time,
/// both within this process and across processes sharing the store.
pub struct Pipeline {
    store: SessionStoreRef,
    locks: SessionLocks,
    conversation: Conversation,
    orchestrator: Orchestrator,
    scripts: ScriptVersions,
    graphs: GraphSynthesizer,
    descriptions: DescriptionSynthesizer,
    publisher: ArtifactPublisher,
}

impl Pipeline {
    pub fn new(backend: BackendRef, store: SessionStoreRef, options: PipelineOptions) -> Pipeline {
        return Pipeline {
            locks: SessionLocks::default(),
            conversation: Conversation::new(store.clone(), options.token_budget),
            orchestrator: Orchestrator::new(
                backend.clone(),
                Conversation::new(store.clone(), options.token_budget),
                ScriptVersions::new(store.clone()),
            ),
            scripts: ScriptVersions::new(store.clone()),
            graphs: GraphSynthesizer::new(backend.clone(), store.clone()),
            descriptions: DescriptionSynthesizer::new(backend, store.clone()),
            publisher: ArtifactPublisher::new(
                store.clone(),
                options.mirror_dir,
                options.mirror_layout,
            ),
            store,
        };
    }

    pub fn from_config() -> Result<Pipeline> {
        let mirror_dir = Config::get(ConfigKey::MirrorDir);
        let options = PipelineOptions {
            token_budget: Config::get_usize(ConfigKey::HistoryTokenBudget),
            mirror_dir: if mirror_dir.is_empty() {
                None
            } else {
                Some(path::PathBuf::from(mirror_dir))
            },
            mirror_layout: Config::get(ConfigKey::MirrorLayout)
                .parse::<MirrorLayout>()
                .unwrap_or(MirrorLayout::Shared),
        };

        return Ok(Pipeline::new(
            BackendManager::from_config()?,
            FsSessionStore::from_config(),
            options,
        ));
    }

    async fn stored_graph(&self, session: &str) -> Option<Graph> {
        let raw = match self.store.read_artifact(session, ArtifactKind::Graph).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::error!(session, err = ?err, "Failed to read stored graph");
                return None;
            }
        };

        return serde_json::from_str::<Graph>(&raw).ok();
    }

    /// Handles one inbound message. Input is validated before any model call.
    /// Only a failed generation call fails the turn, later stages that fail
    /// leave their artifacts stale and the turn still answers.
    pub async fn submit_message(
        &self,
        session: &str,
        user_message: &str,
        history: Option<Vec<HistoryEntry>>,
    ) -> Result<TurnResponse> {
        if !is_valid_session_key(session) {
            return Err(TurnError::InvalidInput(format!("invalid session id '{session}'")).into());
        }
        if user_message.trim().is_empty() {
            return Err(TurnError::InvalidInput("message must not be empty".to_string()).into());
        }

        let _guard = self.locks.acquire(session).await;
        let _lease = self.store.lock_session(session).await?;
        tracing::info!(session, "Starting turn");

        if let Some(history) = history {
            if self.conversation.seed(session, history).await? {
                tracing::debug!(session, "Seeded session from supplied history");
            }
        }

        let extraction = self.orchestrator.run_turn(session, user_message).await?;

        if let Err(err) = self.scripts.save(session, &extraction.scripts).await {
            tracing::error!(session, err = ?err, "Failed to save scripts");
        }
        if let Err(err) = self
            .store
            .write_artifact(session, ArtifactKind::Reply, &extraction.reply)
            .await
        {
            tracing::error!(session, err = ?err, "Failed to save reply");
        }

        let has_scripts = match self.scripts.current(session).await {
            Ok(scripts) => !scripts.is_empty(),
            Err(err) => {
                tracing::error!(session, err = ?err, "Failed to list scripts");
                false
            }
        };
        if !has_scripts {
            tracing::info!(session, "No scripts to describe, skipping graph synthesis");
            let stale = self.stored_graph(session).await;
            return Ok(TurnResponse::new(&extraction.reply, stale));
        }

        let graph = match self.graphs.build(session).await {
            Ok(Some(graph)) => graph,
            Ok(None) => {
                tracing::warn!(session, "Keeping the previously published graph");
                let stale = self.stored_graph(session).await;
                return Ok(TurnResponse::new(&extraction.reply, stale));
            }
            Err(err) => {
                tracing::error!(session, err = ?err, "Graph stage failed, keeping the previously published graph");
                let stale = self.stored_graph(session).await;
                return Ok(TurnResponse::new(&extraction.reply, stale));
            }
        };

        let descriptions = self
            .descriptions
            .build(session, &graph)
            .await
            .unwrap_or_else(|err| {
                tracing::error!(session, err = ?err, "Description stage failed");
                return None;
            });
        let report = self
            .publisher
            .publish(session, &graph, descriptions.as_ref())
            .await;
        if !report.is_clean() {
            tracing::warn!(session, failures = ?report.failures, "Published with failures");
        }

        tracing::info!(
            session,
            scripts = extraction.scripts.len(),
            nodes = graph.nodes.len(),
            "Finished turn"
        );

        return Ok(TurnResponse::new(&extraction.reply, Some(graph)));
    }
}
