use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::Backend;
use crate::domain::models::BackendError;
use crate::domain::models::BackendName;
use crate::domain::models::BackendPrompt;

/// Replays canned completions in order and records every prompt it was
/// sent.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, BackendError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<String, BackendError>>) -> ScriptedBackend {
        return ScriptedBackend {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(vec![]),
        };
    }

    pub fn ok(responses: &[&str]) -> ScriptedBackend {
        return ScriptedBackend::new(
            responses
                .iter()
                .map(|e| return Ok(e.to_string()))
                .collect(),
        );
    }

    pub fn prompts(&self) -> Vec<String> {
        return self.prompts.lock().unwrap().clone();
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> BackendName {
        return BackendName::OpenAI;
    }

    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        return Ok(vec!["scripted".to_string()]);
    }

    async fn get_completion(&self, prompt: BackendPrompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.text);

        let next = self.responses.lock().unwrap().pop_front();
        return match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(err)) => Err(err.into()),
            None => Err(BackendError::Transport {
                backend: self.name(),
                detail: "no scripted response left".to_string(),
            }
            .into()),
        };
    }
}
