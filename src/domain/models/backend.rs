#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use strum::EnumIter;
use strum::EnumVariantNames;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BackendName {
    Claude,
    Ollama,
    OpenAI,
}

impl BackendName {
    pub fn parse(text: String) -> Option<BackendName> {
        return text.parse::<BackendName>().ok();
    }
}

/// Why a completion could not be produced. Callers treat every variant as
/// "no usable completion", the variant only matters for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{backend} request timed out")]
    Timeout { backend: BackendName },
    #[error("{backend} rejected the credentials (status {status})")]
    Auth { backend: BackendName, status: u16 },
    #[error("{backend} is rate limiting requests")]
    RateLimit { backend: BackendName },
    #[error("{backend} returned a malformed response: {detail}")]
    MalformedUpstream { backend: BackendName, detail: String },
    #[error("{backend} failed with status {status}")]
    Upstream { backend: BackendName, status: u16 },
    #[error("{backend} is not reachable: {detail}")]
    Transport { backend: BackendName, detail: String },
}

impl BackendError {
    pub fn from_status(backend: BackendName, status: u16) -> BackendError {
        return match status {
            401 | 403 => BackendError::Auth { backend, status },
            408 | 504 => BackendError::Timeout { backend },
            429 => BackendError::RateLimit { backend },
            _ => BackendError::Upstream { backend, status },
        };
    }

    pub fn from_reqwest(backend: BackendName, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            return BackendError::Timeout { backend };
        }
        if let Some(status) = err.status() {
            return BackendError::from_status(backend, status.as_u16());
        }
        if err.is_decode() {
            return BackendError::MalformedUpstream {
                backend,
                detail: err.to_string(),
            };
        }

        return BackendError::Transport {
            backend,
            detail: err.to_string(),
        };
    }
}

pub struct BackendPrompt {
    pub text: String,
}

impl BackendPrompt {
    pub fn new(text: String) -> BackendPrompt {
        return BackendPrompt { text };
    }
}

#[async_trait]
pub trait Backend {
    fn name(&self) -> BackendName;

    /// Used by `pipesmith health` to verify all configurations are available
    /// to work with the backend.
    async fn health_check(&self) -> Result<()>;

    /// Called by `pipesmith models` to list all available models for the
    /// backend.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Requests a single completion for the prompt. Streamed responses are
    /// collected in full before returning. Failures are returned as
    /// `BackendError` wrapped in `anyhow` and are never retried here.
    async fn get_completion(&self, prompt: BackendPrompt) -> Result<String>;
}

pub type BackendRef = Arc<dyn Backend + Send + Sync>;
