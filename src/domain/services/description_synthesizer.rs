#[cfg(test)]
#[path = "description_synthesizer_test.rs"]
mod tests;

use anyhow::Result;

use super::decode_embedded;
use super::orchestrator::render_scripts;
use super::ScriptVersions;
use crate::domain::models::BackendPrompt;
use crate::domain::models::BackendRef;
use crate::domain::models::DescriptionSet;
use crate::domain::models::Graph;
use crate::domain::models::Script;
use crate::domain::models::SessionStoreRef;

pub fn description_prompt(graph: &Graph, scripts: &[Script]) -> Result<String> {
    let graph_json = serde_json::to_string_pretty(graph)?;
    let node_ids = graph.node_ids().join(", ");

    return Ok(format!(
        r#"This graph describes a data-processing pipeline:

{graph_json}

These are the scripts behind it:

{scripts}

Write a short HTML description for every node explaining what the step does and what it passes on. Answer with a single JSON object and nothing else, mapping each node id to its HTML, for example {{"<node id>": "<h3>Title</h3><p>...</p>"}}.

Use exactly these node ids as keys: {node_ids}"#,
        scripts = render_scripts(scripts),
    ));
}

/// Third model pass that writes one description per graph node.
pub struct DescriptionSynthesizer {
    backend: BackendRef,
    scripts: ScriptVersions,
}

impl DescriptionSynthesizer {
    pub fn new(backend: BackendRef, store: SessionStoreRef) -> DescriptionSynthesizer {
        return DescriptionSynthesizer {
            backend,
            scripts: ScriptVersions::new(store),
        };
    }

    /// Keys the graph does not know are dropped. Missing keys are left for
    /// readers to fill with a placeholder.
    pub async fn build(&self, session: &str, graph: &Graph) -> Result<Option<DescriptionSet>> {
        let scripts = self.scripts.current(session).await?;
        let prompt = description_prompt(graph, &scripts)?;

        let raw = match self
            .backend
            .get_completion(BackendPrompt::new(prompt))
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(session, err = ?err, "Description synthesis failed");
                return Ok(None);
            }
        };

        let mut descriptions = match decode_embedded::<DescriptionSet>(&raw) {
            Ok(descriptions) => descriptions,
            Err(err) => {
                tracing::error!(session, err = %err, raw = %raw, "Failed to decode descriptions");
                return Ok(None);
            }
        };

        let dropped = descriptions.retain_graph_nodes(graph);
        if !dropped.is_empty() {
            tracing::warn!(session, dropped = ?dropped, "Dropped descriptions for unknown nodes");
        }
        let missing = descriptions.missing_nodes(graph);
        if !missing.is_empty() {
            tracing::warn!(session, missing = ?missing, "Nodes without descriptions");
        }

        return Ok(Some(descriptions));
    }
}
