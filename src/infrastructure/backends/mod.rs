#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub mod claude;
pub mod ollama;
pub mod openai;
#[cfg(test)]
pub mod scripted;

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use futures::stream::TryStreamExt;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::Lines;
use tokio_util::io::StreamReader;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendError;
use crate::domain::models::BackendName;
use crate::domain::models::BackendRef;

fn convert_err(err: reqwest::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

fn config_millis(key: ConfigKey) -> Duration {
    return Duration::from_millis(Config::get_usize(key) as u64);
}

fn configured_model(fallback: &str) -> String {
    let model = Config::get(ConfigKey::Model);
    if model.is_empty() {
        return fallback.to_string();
    }

    return model;
}

/// Turns a non success completion response into a classified error.
fn check_status(backend: BackendName, res: &reqwest::Response) -> Result<()> {
    if res.status().is_success() {
        return Ok(());
    }

    let status = res.status().as_u16();
    tracing::error!(status, backend = %backend, "Failed to make completion request");
    return Err(BackendError::from_status(backend, status).into());
}

/// Line reader over a streamed response body.
fn body_lines(res: reqwest::Response) -> Lines<impl AsyncBufRead + Unpin> {
    let stream = res.bytes_stream().map_err(convert_err);
    return StreamReader::new(stream).lines();
}

async fn next_line<R: AsyncBufRead + Unpin>(
    backend: BackendName,
    lines: &mut Lines<R>,
) -> Result<Option<String>> {
    return lines.next_line().await.map_err(|err| {
        return anyhow::Error::from(BackendError::Transport {
            backend,
            detail: err.to_string(),
        });
    });
}

fn malformed(backend: BackendName, detail: String) -> anyhow::Error {
    return BackendError::MalformedUpstream { backend, detail }.into();
}

pub struct BackendManager {}

impl BackendManager {
    pub fn get(name: BackendName) -> Result<BackendRef> {
        let backend: BackendRef = match name {
            BackendName::Claude => Arc::<claude::Claude>::default(),
            BackendName::Ollama => Arc::<ollama::Ollama>::default(),
            BackendName::OpenAI => Arc::<openai::OpenAI>::default(),
        };

        return Ok(backend);
    }

    /// Resolves a backend by its config name, `openai` for example.
    pub fn by_name(name: &str) -> Result<BackendRef> {
        if let Some(backend) = BackendName::parse(name.to_string()) {
            return BackendManager::get(backend);
        }

        bail!(format!("Unknown backend '{name}'"));
    }

    /// The backend selected by `ConfigKey::Backend`.
    pub fn from_config() -> Result<BackendRef> {
        return BackendManager::by_name(&Config::get(ConfigKey::Backend));
    }
}
