#[cfg(test)]
#[path = "history_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Role;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: Role, content: &str) -> HistoryEntry {
        return HistoryEntry {
            role,
            content: content.to_string(),
        };
    }

    pub fn user(content: &str) -> HistoryEntry {
        return HistoryEntry::new(Role::User, content);
    }

    pub fn assistant(content: &str) -> HistoryEntry {
        return HistoryEntry::new(Role::Assistant, content);
    }

    /// Rough token estimate, a quarter of the character count. Not a
    /// tokenizer.
    pub fn token_cost(&self) -> usize {
        return self.content.chars().count() / 4;
    }

    /// Line used when serializing the conversation into a prompt.
    pub fn as_prompt_line(&self) -> String {
        let role = self.role.to_string().to_uppercase();
        return format!("{role}: {}", self.content);
    }
}
