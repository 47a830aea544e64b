use std::sync::Arc;

use anyhow::Result;
use test_utils::generation_fixture;

use super::generation_prompt;
use super::Orchestrator;
use crate::domain::models::BackendError;
use crate::domain::models::BackendName;
use crate::domain::models::HistoryEntry;
use crate::domain::models::Role;
use crate::domain::models::Script;
use crate::domain::models::SessionStore;
use crate::domain::models::SessionStoreRef;
use crate::domain::models::TurnError;
use crate::domain::services::Conversation;
use crate::domain::services::ScriptVersions;
use crate::infrastructure::backends::scripted::ScriptedBackend;
use crate::infrastructure::storage::MemorySessionStore;

fn orchestrator(backend: Arc<ScriptedBackend>, store: SessionStoreRef) -> Orchestrator {
    return Orchestrator::new(
        backend,
        Conversation::new(store.clone(), 3000),
        ScriptVersions::new(store),
    );
}

#[test]
fn it_builds_the_generation_prompt() {
    let prompt = generation_prompt(
        &[
            HistoryEntry::user("read a file"),
            HistoryEntry::assistant("Reply: done"),
        ],
        &[Script::new("read_file.py", 3, "print(1)")],
    );

    assert!(prompt.contains("USER: read a file\nASSISTANT: Reply: done"));
    assert!(prompt.contains("```python\n# read_file.py (Version 3)\nprint(1)\n```"));
    assert!(prompt.contains("Start your answer with \"Reply:\""));
    assert!(prompt.contains("Never resend a script that does not change."));
}

#[test]
fn it_mentions_an_empty_script_set() {
    let prompt = generation_prompt(&[HistoryEntry::user("hi")], &[]);
    assert!(prompt.contains("There are no scripts yet."));
}

#[tokio::test]
async fn it_runs_a_turn() -> Result<()> {
    let store: SessionStoreRef = Arc::new(MemorySessionStore::default());
    let backend = Arc::new(ScriptedBackend::ok(&[generation_fixture()]));

    let res = orchestrator(backend.clone(), store.clone())
        .run_turn("s1", "create a pipeline that reads a file and uppercases it")
        .await?;

    assert_eq!(res.scripts.len(), 2);
    assert!(!res.reply.is_empty());

    let history = store.load_history("s1").await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1], HistoryEntry::assistant(generation_fixture()));

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("USER: create a pipeline that reads a file and uppercases it"));
    return Ok(());
}

#[tokio::test]
async fn it_aborts_when_the_backend_fails() -> Result<()> {
    let store: SessionStoreRef = Arc::new(MemorySessionStore::default());
    let backend = Arc::new(ScriptedBackend::new(vec![Err(BackendError::RateLimit {
        backend: BackendName::OpenAI,
    })]));

    let err = orchestrator(backend, store.clone())
        .run_turn("s1", "hello")
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<TurnError>(),
        Some(TurnError::NoCompletion(_))
    ));
    insta::assert_snapshot!(err.to_string(), @"no completion was produced: openai is rate limiting requests");

    // Only the user entry made it in.
    assert_eq!(
        store.load_history("s1").await?,
        vec![HistoryEntry::user("hello")]
    );
    return Ok(());
}

#[tokio::test]
async fn it_completes_turns_without_scripts() -> Result<()> {
    let store: SessionStoreRef = Arc::new(MemorySessionStore::default());
    let backend = Arc::new(ScriptedBackend::ok(&["Reply: Nothing needs to change."]));

    let res = orchestrator(backend, store.clone())
        .run_turn("s1", "anything to do?")
        .await?;

    assert_eq!(res.reply, "Nothing needs to change.");
    assert!(res.scripts.is_empty());
    assert_eq!(store.load_history("s1").await?.len(), 2);
    return Ok(());
}
