use anyhow::Result;
use tokio::fs;

use super::Config;
use super::ConfigKey;
use crate::application::cli;

#[test]
fn it_serializes_to_valid_toml() {
    let res = Config::serialize_default(cli::build());
    let toml_res = res.parse::<toml_edit::Document>();
    assert!(toml_res.is_ok());

    assert!(res.contains("backend = \"ollama\""));
    assert!(res.contains("history-token-budget = 3000"));
    assert!(res.contains("# mirror-dir = \"\""));
    assert!(!res.contains("session-id"));
}

#[test]
fn it_renders_url_keys_without_splitting_acronyms() {
    assert_eq!(ConfigKey::OpenAiURL.to_string(), "openai-url");
    assert_eq!(ConfigKey::OllamaURL.to_string(), "ollama-url");
    assert_eq!(ConfigKey::SessionID.to_string(), "session-id");
    assert_eq!(ConfigKey::HistoryTokenBudget.to_string(), "history-token-budget");
}

// Both cases share the process-wide config, so they run in one test.
#[tokio::test]
async fn it_loads_and_validates_config_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        "backend = \"openai\"\nmirror-layout = \"session\"\nhistory-token-budget = 1200\n",
    )
    .await?;

    let config_path_str = config_path.to_string_lossy().to_string();
    let matches = cli::build().try_get_matches_from(vec![
        "pipesmith",
        "-c",
        &config_path_str,
        "models",
    ])?;
    Config::load(cli::build(), vec![&matches]).await?;

    assert_eq!(Config::get(ConfigKey::Backend), "openai");
    assert_eq!(Config::get(ConfigKey::MirrorLayout), "session");
    assert_eq!(Config::get_usize(ConfigKey::HistoryTokenBudget), 1200);

    let bad_config_path = dir.path().join("bad-config.toml");
    fs::write(&bad_config_path, "backend = \"not-a-backend\"\n").await?;

    let bad_config_path_str = bad_config_path.to_string_lossy().to_string();
    let matches = cli::build().try_get_matches_from(vec![
        "pipesmith",
        "-c",
        &bad_config_path_str,
        "models",
    ])?;
    let res = Config::load(cli::build(), vec![&matches]).await;
    assert!(res.is_err());

    return Ok(());
}
