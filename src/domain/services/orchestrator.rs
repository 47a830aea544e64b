#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

use anyhow::Result;

use super::extractor;
use super::extractor::Extraction;
use super::extractor::REPLY_MARKER;
use super::Conversation;
use super::ScriptVersions;
use crate::domain::models::BackendPrompt;
use crate::domain::models::BackendRef;
use crate::domain::models::HistoryEntry;
use crate::domain::models::Script;
use crate::domain::models::TurnError;

/// Renders scripts as fenced blocks headed by their version comment.
pub fn render_scripts(scripts: &[Script]) -> String {
    return scripts
        .iter()
        .map(|script| {
            return format!("```{}\n{}\n```", script.fence_language(), script.render());
        })
        .collect::<Vec<String>>()
        .join("\n\n");
}

pub fn generation_prompt(history: &[HistoryEntry], scripts: &[Script]) -> String {
    let conversation = history
        .iter()
        .map(|entry| return entry.as_prompt_line())
        .collect::<Vec<String>>()
        .join("\n");

    let current_scripts = if scripts.is_empty() {
        "There are no scripts yet.".to_string()
    } else {
        render_scripts(scripts)
    };

    return format!(
        r#"You help a user build a small data-processing pipeline out of scripts.

Conversation so far:
{conversation}

Current scripts:
{current_scripts}

Instructions:
- Decide which scripts need to change to satisfy the latest user message.
- Never resend a script that does not change.
- Increase the version of every script you change by one. New scripts start at Version 1.
- Aim for 2 to 5 scripts in total.
- Start your answer with "{REPLY_MARKER}" followed by a short explanation for the user.
- Put every script in its own fenced code block tagged with its language. The first line of each block must be a comment of the form `# <filename> (Version <n>)`."#
    );
}

/// Drives the generation half of a turn. Persisting the extracted scripts
/// and building the graph is left to the caller.
pub struct Orchestrator {
    backend: BackendRef,
    conversation: Conversation,
    scripts: ScriptVersions,
}

impl Orchestrator {
    pub fn new(
        backend: BackendRef,
        conversation: Conversation,
        scripts: ScriptVersions,
    ) -> Orchestrator {
        return Orchestrator {
            backend,
            conversation,
            scripts,
        };
    }

    /// Records the user message, asks the model once and records its raw
    /// answer. A backend failure aborts the turn after the user entry was
    /// stored, nothing is retried.
    pub async fn run_turn(&self, session: &str, user_message: &str) -> Result<Extraction> {
        let history = self
            .conversation
            .append(session, HistoryEntry::user(user_message))
            .await?;
        let current = self.scripts.current(session).await?;

        let prompt = generation_prompt(&history, &current);
        tracing::debug!(
            session,
            history = history.len(),
            scripts = current.len(),
            prompt_len = prompt.len(),
            "Requesting generation"
        );

        let completion = match self
            .backend
            .get_completion(BackendPrompt::new(prompt))
            .await
        {
            Ok(completion) => completion,
            Err(err) => {
                tracing::error!(session, err = ?err, "Generation failed, aborting turn");
                return Err(TurnError::NoCompletion(err).into());
            }
        };

        self.conversation
            .append(session, HistoryEntry::assistant(&completion))
            .await?;

        let extraction = extractor::extract(&completion);
        tracing::debug!(
            session,
            scripts = extraction.scripts.len(),
            "Extracted generation"
        );

        return Ok(extraction);
    }
}
