#[cfg(test)]
#[path = "graph_synthesizer_test.rs"]
mod tests;

use anyhow::Result;

use super::decode_embedded;
use super::orchestrator::render_scripts;
use super::ScriptVersions;
use crate::domain::models::ArtifactKind;
use crate::domain::models::BackendPrompt;
use crate::domain::models::BackendRef;
use crate::domain::models::Graph;
use crate::domain::models::Script;
use crate::domain::models::SessionStoreRef;
use crate::domain::models::NODE_KIND;

pub fn graph_prompt(scripts: &[Script], reply: &str) -> String {
    return format!(
        r#"The following scripts make up a data-processing pipeline.

{scripts}

The assistant described the latest change as:
{reply}

Describe the whole pipeline as a graph and answer with a single JSON object and nothing else, using this schema:
{{
  "reply": "<one sentence summary of the pipeline>",
  "nodes": [
    {{
      "id": "<unique id, usually the script name without extension>",
      "type": "{NODE_KIND}",
      "position": {{ "x": <number>, "y": <number> }},
      "data": {{
        "label": "<short title>",
        "role": "input" | "process" | "output",
        "description": "<optional one line summary>",
        "inputs": ["input-0", ...],
        "outputs": ["output-0", ...],
        "color": "<optional css color>"
      }}
    }}
  ],
  "edges": [
    {{
      "id": "<source>-<target>",
      "source": "<node id>",
      "target": "<node id>",
      "sourceHandle": "output-<n>",
      "targetHandle": "input-<n>",
      "animated": true
    }}
  ]
}}

Rules:
- Handles are named input-<n> and output-<n>, numbered from 0 without gaps on every node.
- Nodes with role "input" have no inputs. Nodes with role "output" have no outputs.
- Every edge must use a sourceHandle listed in the source node outputs and a targetHandle listed in the target node inputs.
- Node and edge ids are unique."#,
        scripts = render_scripts(scripts),
    );
}

/// Second model pass that turns the full current script set into a graph.
pub struct GraphSynthesizer {
    backend: BackendRef,
    store: SessionStoreRef,
    scripts: ScriptVersions,
}

impl GraphSynthesizer {
    pub fn new(backend: BackendRef, store: SessionStoreRef) -> GraphSynthesizer {
        return GraphSynthesizer {
            backend,
            scripts: ScriptVersions::new(store.clone()),
            store,
        };
    }

    /// Returns `None` when the model fails, answers with something that is
    /// not a graph, or with a graph that breaks the handle rules. Nothing is
    /// retried.
    pub async fn build(&self, session: &str) -> Result<Option<Graph>> {
        let scripts = self.scripts.current(session).await?;
        let reply = self
            .store
            .read_artifact(session, ArtifactKind::Reply)
            .await?
            .unwrap_or_default();

        let prompt = graph_prompt(&scripts, &reply);
        let raw = match self
            .backend
            .get_completion(BackendPrompt::new(prompt))
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(session, err = ?err, "Graph synthesis failed");
                return Ok(None);
            }
        };

        let mut graph = match decode_embedded::<Graph>(&raw) {
            Ok(graph) => graph,
            Err(err) => {
                tracing::error!(session, err = %err, raw = %raw, "Failed to decode graph");
                return Ok(None);
            }
        };

        if let Err(err) = graph.validate() {
            tracing::error!(session, err = %err, raw = %raw, "Rejected invalid graph");
            return Ok(None);
        }

        if graph.reply.trim().is_empty() {
            graph.reply = reply;
        }

        return Ok(Some(graph));
    }
}
