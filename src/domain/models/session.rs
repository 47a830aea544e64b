#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use serde_derive::Serialize;
use serde_json::Value;

use super::Edge;
use super::Graph;
use super::HistoryEntry;
use super::Node;
use super::Role;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no completion was produced: {0:#}")]
    NoCompletion(anyhow::Error),
}

/// Session keys double as directory names.
pub fn is_valid_session_key(key: &str) -> bool {
    if key.is_empty() || key.len() > 64 {
        return false;
    }

    return key
        .chars()
        .all(|c| return c.is_ascii_alphanumeric() || c == '-' || c == '_');
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub timestamp: String,
    pub first_message: Option<String>,
    pub script_count: usize,
}

/// What a turn hands back to the web tier.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TurnResponse {
    pub reply: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl TurnResponse {
    pub fn new(reply: &str, graph: Option<Graph>) -> TurnResponse {
        let graph = graph.unwrap_or_default();
        return TurnResponse {
            reply: reply.to_string(),
            nodes: graph.nodes,
            edges: graph.edges,
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitRequest {
    pub session_id: Option<String>,
    pub message: String,
    pub history: Option<Vec<HistoryEntry>>,
}

fn invalid(msg: String) -> TurnError {
    return TurnError::InvalidInput(msg);
}

impl SubmitRequest {
    /// Validates a raw inbound payload of the shape
    /// `{"session_id"?, "message", "history"?: [{"role", "content"}]}`.
    pub fn from_json(value: &Value) -> Result<SubmitRequest, TurnError> {
        let obj = value
            .as_object()
            .ok_or_else(|| return invalid("request must be a JSON object".to_string()))?;

        let message = obj
            .get("message")
            .and_then(|e| return e.as_str())
            .ok_or_else(|| return invalid("message must be a string".to_string()))?;
        if message.trim().is_empty() {
            return Err(invalid("message must not be empty".to_string()));
        }

        let session_id = match obj.get("session_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.to_string()),
            Some(_) => return Err(invalid("session_id must be a string".to_string())),
        };

        let history = match obj.get("history") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => {
                let mut entries = vec![];
                for (idx, item) in items.iter().enumerate() {
                    let role = item
                        .get("role")
                        .and_then(|e| return e.as_str())
                        .and_then(|e| return e.parse::<Role>().ok())
                        .ok_or_else(|| {
                            return invalid(format!(
                                "history entry {idx} must have a role of user or assistant"
                            ));
                        })?;
                    let content = item
                        .get("content")
                        .and_then(|e| return e.as_str())
                        .ok_or_else(|| {
                            return invalid(format!("history entry {idx} content must be text"));
                        })?;
                    entries.push(HistoryEntry::new(role, content));
                }
                Some(entries)
            }
            Some(_) => return Err(invalid("history must be an array".to_string())),
        };

        return Ok(SubmitRequest {
            session_id,
            message: message.to_string(),
            history,
        });
    }
}
