#[cfg(test)]
#[path = "claude_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::body_lines;
use super::check_status;
use super::config_millis;
use super::configured_model;
use super::malformed;
use super::next_line;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendError;
use crate::domain::models::BackendName;
use crate::domain::models::BackendPrompt;

const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const OFFICIAL_URL: &str = "https://api.anthropic.com";

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Model {
    id: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ModelListResponse {
    data: Vec<Model>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessageRequest {
    role: String,
    content: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<MessageRequest>,
    stream: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Healthcheck {
    message: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionDeltaResponse {
    #[serde(rename = "type")]
    _type: String,
    #[serde(default)]
    text: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    #[serde(rename = "type")]
    _type: String,
    delta: CompletionDeltaResponse,
}

pub struct Claude {
    url: String,
    token: String,
    model: String,
    timeout: Duration,
    health_check_timeout: Duration,
}

impl Default for Claude {
    fn default() -> Claude {
        return Claude {
            url: OFFICIAL_URL.to_string(),
            token: Config::get(ConfigKey::ClaudeToken),
            model: configured_model(DEFAULT_MODEL),
            timeout: config_millis(ConfigKey::BackendTimeout),
            health_check_timeout: config_millis(ConfigKey::BackendHealthCheckTimeout),
        };
    }
}

impl Claude {
    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        return req
            .header("x-api-key", &self.token)
            .header("content-type", "application/json")
            .header("anthropic-version", "2023-06-01");
    }
}

#[async_trait]
impl Backend for Claude {
    fn name(&self) -> BackendName {
        return BackendName::Claude;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("Claude URL is not defined");
        }
        if self.token.is_empty() {
            bail!("Claude token is not defined");
        }
        if self.url == OFFICIAL_URL {
            return Ok(());
        }

        let res = reqwest::Client::new()
            .get(format!("{url}/healthcheck", url = self.url))
            .timeout(self.health_check_timeout)
            .send()
            .await;

        let result = match res {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = ?err, "Claude is not reachable");
                bail!("Claude is not reachable");
            }
        };

        let status = result.status().as_u16();
        if status >= 400 {
            tracing::error!(status = status, "Claude health check failed");
            bail!("Claude health check failed");
        }

        let json = result.json::<Healthcheck>().await?;
        if !json.message.contains("ok") {
            bail!("Claude health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Result<Vec<String>> {
        let res = self
            .request(reqwest::Client::new().get(format!("{url}/v1/models", url = self.url)))
            .send()
            .await?
            .json::<ModelListResponse>()
            .await?;

        let mut models: Vec<String> = res
            .data
            .iter()
            .map(|model| {
                return model.id.to_string();
            })
            .collect();

        models.sort();

        return Ok(models);
    }

    #[allow(clippy::implicit_return)]
    async fn get_completion(&self, prompt: BackendPrompt) -> Result<String> {
        let req = CompletionRequest {
            model: self.model.to_string(),
            max_tokens: 4096,
            messages: vec![MessageRequest {
                role: "user".to_string(),
                content: prompt.text,
            }],
            stream: true,
        };

        let res = self
            .request(reqwest::Client::new().post(format!("{url}/v1/messages", url = self.url)))
            .timeout(self.timeout)
            .json(&req)
            .send()
            .await
            .map_err(|err| return BackendError::from_reqwest(self.name(), err))?;

        check_status(self.name(), &res)?;

        let mut lines_reader = body_lines(res);
        let mut completion = "".to_string();
        while let Some(line) = next_line(self.name(), &mut lines_reader).await? {
            let mut cleaned_line = line.trim().to_string();
            if cleaned_line.starts_with("data:") {
                cleaned_line = cleaned_line.split_off(5).trim().to_string();
            }
            if cleaned_line.is_empty() || cleaned_line.starts_with("event:") {
                continue;
            }

            if cleaned_line.contains("\"message_stop\"") {
                break;
            }
            if !cleaned_line.contains("content_block_delta") {
                continue;
            }

            let ores: CompletionResponse = serde_json::from_str(&cleaned_line)
                .map_err(|err| return malformed(self.name(), err.to_string()))?;
            tracing::debug!(body = ?ores, "Completion response");

            completion += &ores.delta.text;
        }

        if completion.is_empty() {
            return Err(malformed(self.name(), "empty completion".to_string()));
        }

        return Ok(completion);
    }
}
