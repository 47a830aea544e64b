#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;

use std::collections::HashMap;
use std::collections::HashSet;

use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Node type the UI registers its custom renderer under.
pub const NODE_KIND: &str = "custom";

fn default_kind() -> String {
    return NODE_KIND.to_string();
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeRole {
    Input,
    Process,
    Output,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    pub role: NodeRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub position: Position,
    pub data: NodeData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: String,
    pub target_handle: String,
    #[serde(default)]
    pub animated: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub reply: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node id '{0}' is used more than once")]
    DuplicateNode(String),
    #[error("edge id '{0}' is used more than once")]
    DuplicateEdge(String),
    #[error("node '{node}' has type '{kind}', expected '{NODE_KIND}'")]
    UnexpectedKind { node: String, kind: String },
    #[error("node '{node}' has handle '{handle}' where '{expected}' was expected")]
    MisnumberedHandle {
        node: String,
        handle: String,
        expected: String,
    },
    #[error("input node '{0}' must not declare inputs")]
    InputWithInputs(String),
    #[error("output node '{0}' must not declare outputs")]
    OutputWithOutputs(String),
    #[error("edge '{edge}' references unknown node '{node}'")]
    UnknownNode { edge: String, node: String },
    #[error("edge '{edge}' uses handle '{handle}' which node '{node}' does not declare")]
    DanglingHandle {
        edge: String,
        node: String,
        handle: String,
    },
}

fn check_handles(node: &str, handles: &[String], prefix: &str) -> Result<(), GraphError> {
    for (idx, handle) in handles.iter().enumerate() {
        let expected = format!("{prefix}-{idx}");
        if *handle != expected {
            return Err(GraphError::MisnumberedHandle {
                node: node.to_string(),
                handle: handle.to_string(),
                expected,
            });
        }
    }

    return Ok(());
}

impl Graph {
    pub fn node_ids(&self) -> Vec<String> {
        return self
            .nodes
            .iter()
            .map(|node| return node.id.to_string())
            .collect();
    }

    /// Checks the structural rules the UI relies on. The first violation
    /// found is returned.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut nodes: HashMap<&str, &Node> = HashMap::new();
        for node in self.nodes.iter() {
            if nodes.insert(node.id.as_str(), node).is_some() {
                return Err(GraphError::DuplicateNode(node.id.to_string()));
            }
            if node.kind != NODE_KIND {
                return Err(GraphError::UnexpectedKind {
                    node: node.id.to_string(),
                    kind: node.kind.to_string(),
                });
            }

            check_handles(&node.id, &node.data.inputs, "input")?;
            check_handles(&node.id, &node.data.outputs, "output")?;

            if node.data.role == NodeRole::Input && !node.data.inputs.is_empty() {
                return Err(GraphError::InputWithInputs(node.id.to_string()));
            }
            if node.data.role == NodeRole::Output && !node.data.outputs.is_empty() {
                return Err(GraphError::OutputWithOutputs(node.id.to_string()));
            }
        }

        let mut edge_ids: HashSet<&str> = HashSet::new();
        for edge in self.edges.iter() {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(GraphError::DuplicateEdge(edge.id.to_string()));
            }

            let source = nodes
                .get(edge.source.as_str())
                .ok_or_else(|| {
                    return GraphError::UnknownNode {
                        edge: edge.id.to_string(),
                        node: edge.source.to_string(),
                    };
                })?;
            let target = nodes
                .get(edge.target.as_str())
                .ok_or_else(|| {
                    return GraphError::UnknownNode {
                        edge: edge.id.to_string(),
                        node: edge.target.to_string(),
                    };
                })?;

            if !source.data.outputs.contains(&edge.source_handle) {
                return Err(GraphError::DanglingHandle {
                    edge: edge.id.to_string(),
                    node: source.id.to_string(),
                    handle: edge.source_handle.to_string(),
                });
            }
            if !target.data.inputs.contains(&edge.target_handle) {
                return Err(GraphError::DanglingHandle {
                    edge: edge.id.to_string(),
                    node: target.id.to_string(),
                    handle: edge.target_handle.to_string(),
                });
            }
        }

        return Ok(());
    }
}
