#[cfg(test)]
#[path = "description_test.rs"]
mod tests;

use std::collections::BTreeMap;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Graph;

pub const DESCRIPTION_PLACEHOLDER: &str = "<p>No description available for this step yet.</p>";

/// Rendered HTML description per node id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptionSet {
    pub entries: BTreeMap<String, String>,
}

impl DescriptionSet {
    pub fn get_or_placeholder(&self, node_id: &str) -> &str {
        return self
            .entries
            .get(node_id)
            .map(|e| return e.as_str())
            .unwrap_or(DESCRIPTION_PLACEHOLDER);
    }

    /// Drops keys that are not node ids of `graph`, returning them.
    pub fn retain_graph_nodes(&mut self, graph: &Graph) -> Vec<String> {
        let node_ids = graph.node_ids();
        let dropped = self
            .entries
            .keys()
            .filter(|key| return !node_ids.contains(*key))
            .cloned()
            .collect::<Vec<String>>();

        for key in dropped.iter() {
            self.entries.remove(key);
        }

        return dropped;
    }

    pub fn missing_nodes(&self, graph: &Graph) -> Vec<String> {
        return graph
            .node_ids()
            .into_iter()
            .filter(|id| return !self.entries.contains_key(id))
            .collect();
    }
}
