use std::time::Duration;

use anyhow::Result;

use super::CompletionChoiceResponse;
use super::CompletionDeltaResponse;
use super::CompletionResponse;
use super::Model;
use super::ModelListResponse;
use super::OpenAI;
use crate::domain::models::Backend;
use crate::domain::models::BackendError;
use crate::domain::models::BackendPrompt;

impl OpenAI {
    fn with_url(url: String) -> OpenAI {
        return OpenAI {
            url,
            token: "abc".to_string(),
            model: "gpt-test".to_string(),
            timeout: Duration::from_millis(2000),
            health_check_timeout: Duration::from_millis(500),
        };
    }
}

fn chunk(text: &str) -> String {
    let res = CompletionResponse {
        choices: vec![CompletionChoiceResponse {
            delta: CompletionDeltaResponse {
                content: Some(text.to_string()),
            },
        }],
    };
    return format!("data: {}", serde_json::to_string(&res).unwrap());
}

#[tokio::test]
async fn it_successfully_health_checks() {
    let mut server = mockito::Server::new();
    let mock = server.mock("GET", "/").with_status(200).create();

    let backend = OpenAI::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_ok());
    mock.assert();
}

#[tokio::test]
async fn it_successfully_health_checks_418() {
    let mut server = mockito::Server::new();
    let mock = server.mock("GET", "/").with_status(418).create();

    let backend = OpenAI::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_ok());
    mock.assert();
}

#[tokio::test]
async fn it_fails_health_checks() {
    let mut server = mockito::Server::new();
    let mock = server.mock("GET", "/").with_status(500).create();

    let backend = OpenAI::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_err());
    mock.assert();
}

#[tokio::test]
async fn it_lists_models() -> Result<()> {
    let body = serde_json::to_string(&ModelListResponse {
        data: vec![
            Model {
                id: "second".to_string(),
            },
            Model {
                id: "first".to_string(),
            },
        ],
    })?;

    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/v1/models")
        .match_header("Authorization", "Bearer abc")
        .with_status(200)
        .with_body(body)
        .create();

    let backend = OpenAI::with_url(server.url());
    let res = backend.list_models().await?;
    mock.assert();

    assert_eq!(res, vec!["first".to_string(), "second".to_string()]);

    return Ok(());
}

#[tokio::test]
async fn it_collects_streamed_completions() -> Result<()> {
    let body = [
        chunk("Reply: "),
        "".to_string(),
        chunk("Hello World"),
        "data: {\"choices\":[{\"delta\":{}}]}".to_string(),
        "data: [DONE]".to_string(),
    ]
    .join("\n");

    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("Authorization", "Bearer abc")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"model": "gpt-test", "stream": true}"#.to_string(),
        ))
        .with_status(200)
        .with_body(body)
        .create();

    let backend = OpenAI::with_url(server.url());
    let res = backend
        .get_completion(BackendPrompt::new("Say hi to the world".to_string()))
        .await?;

    mock.assert();
    assert_eq!(res, "Reply: Hello World");

    return Ok(());
}

#[tokio::test]
async fn it_classifies_rate_limits() -> Result<()> {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .create();

    let backend = OpenAI::with_url(server.url());
    let err = backend
        .get_completion(BackendPrompt::new("hi".to_string()))
        .await
        .unwrap_err();

    mock.assert();
    assert!(matches!(
        err.downcast_ref::<BackendError>(),
        Some(BackendError::RateLimit { .. })
    ));

    return Ok(());
}

#[tokio::test]
async fn it_rejects_malformed_stream_lines() -> Result<()> {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body("data: {not json")
        .create();

    let backend = OpenAI::with_url(server.url());
    let err = backend
        .get_completion(BackendPrompt::new("hi".to_string()))
        .await
        .unwrap_err();

    mock.assert();
    assert!(matches!(
        err.downcast_ref::<BackendError>(),
        Some(BackendError::MalformedUpstream { .. })
    ));

    return Ok(());
}
