#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use serde_json::json;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ArtifactKind;
use crate::domain::models::BackendName;
use crate::domain::models::DescriptionSet;
use crate::domain::models::Graph;
use crate::domain::models::MirrorLayout;
use crate::domain::models::SessionStore;
use crate::domain::models::SessionSummary;
use crate::domain::models::SubmitRequest;
use crate::domain::services::Conversation;
use crate::domain::services::Pipeline;
use crate::domain::services::ScriptVersions;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::storage::FsSessionStore;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

pub fn format_session(session: &SessionSummary) -> String {
    let mut res = format!(
        "- (ID: {}) {}, Scripts: {}",
        session.id, session.timestamp, session.script_count
    );

    if let Some(first_message) = &session.first_message {
        let mut line = first_message
            .split('\n')
            .next()
            .unwrap_or_default()
            .to_string();

        if line.chars().count() >= 70 {
            line = format!("{}...", line.chars().take(67).collect::<String>());
        }
        res = format!("{res}, {line}");
    }

    return res;
}

async fn print_sessions_list() -> Result<()> {
    let mut sessions = FsSessionStore::from_config()
        .list_sessions()
        .await?
        .iter()
        .map(|session| {
            return format_session(session);
        })
        .collect::<Vec<String>>();

    sessions.reverse();

    if sessions.is_empty() {
        println!("There are no sessions available. Submit a message to start your first one!");
    } else {
        println!("{}", sessions.join("\n"));
    }

    return Ok(());
}

async fn print_session(session_id: &str) -> Result<()> {
    let store = FsSessionStore::from_config();
    let reply = store
        .read_artifact(session_id, ArtifactKind::Reply)
        .await?
        .unwrap_or_default();
    let scripts = ScriptVersions::new(store.clone()).current(session_id).await?;

    if reply.is_empty() && scripts.is_empty() {
        bail!(format!("Session {session_id} has no reply or scripts yet"));
    }

    let history = Conversation::new(
        store.clone(),
        Config::get_usize(ConfigKey::HistoryTokenBudget),
    )
    .load(session_id)
    .await?;
    println!("{}", Paint::new("CONVERSATION").bold().underline());
    for entry in history.iter() {
        println!("{}", entry.as_prompt_line());
    }

    println!("\n{}\n{reply}", Paint::new("REPLY").bold().underline());
    for script in scripts.iter() {
        println!(
            "\n{}\n{}",
            Paint::new(format!("{} (Version {})", script.filename, script.version))
                .bold()
                .underline(),
            script.content
        );
    }

    let graph = store.read_artifact(session_id, ArtifactKind::Graph).await?;
    if let Some(graph) = graph {
        let graph = serde_json::from_str::<Graph>(&graph)?;
        let descriptions = match store
            .read_artifact(session_id, ArtifactKind::Descriptions)
            .await?
        {
            Some(raw) => serde_json::from_str::<DescriptionSet>(&raw)?,
            None => DescriptionSet::default(),
        };

        println!("\n{}", Paint::new("GRAPH").bold().underline());
        for node in graph.nodes.iter() {
            println!(
                "- {} ({}, {}): {}",
                node.id,
                node.data.label,
                node.data.role,
                descriptions.get_or_placeholder(&node.id)
            );
        }
        for edge in graph.edges.iter() {
            println!(
                "- {}.{} -> {}.{}",
                edge.source, edge.source_handle, edge.target, edge.target_handle
            );
        }
    }

    return Ok(());
}

async fn read_history_file(history_file: &str) -> Result<serde_json::Value> {
    let payload = fs::read_to_string(history_file).await?;
    return Ok(serde_json::from_str(&payload)?);
}

async fn submit(submit_matches: &ArgMatches) -> Result<()> {
    let message = submit_matches
        .get_one::<String>("message")
        .map(|e| return e.to_string())
        .unwrap_or_default();

    let mut session_id = Config::get(ConfigKey::SessionID);
    if session_id.is_empty() {
        session_id = Uuid::new_v4().to_string();
    }

    let mut history = serde_json::Value::Null;
    if let Some(history_file) = submit_matches.get_one::<String>("history") {
        history = read_history_file(history_file).await?;
    }

    let req = SubmitRequest::from_json(&json!({
        "session_id": session_id,
        "message": message,
        "history": history,
    }))?;

    let session_id = req.session_id.unwrap_or(session_id);
    let res = Pipeline::from_config()?
        .submit_message(&session_id, &req.message, req.history)
        .await?;

    eprintln!("Session: {session_id}");
    println!("{}", serde_json::to_string_pretty(&res)?);

    return Ok(());
}

async fn print_models() -> Result<()> {
    let backend = BackendManager::from_config()?;
    backend.health_check().await?;

    let models = backend.list_models().await?;
    println!("{}", models.join("\n"));

    return Ok(());
}

async fn print_health() -> Result<()> {
    let backend = BackendManager::from_config()?;
    backend.health_check().await?;

    println!(
        "{} {} is reachable",
        Paint::green("✓"),
        Config::get(ConfigKey::Backend)
    );
    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(config_file_path.clone()).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    let mut cmd = Command::new("debug");
    cmd = cmd.about("Debug helpers for Pipesmith")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running Pipesmith with environment variable RUST_LOG=pipesmith")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );

    return cmd;
}

fn arg_session_id() -> Arg {
    return Arg::new(ConfigKey::SessionID.to_string())
        .short('i')
        .long("id")
        .help("Session ID")
        .num_args(1);
}

fn subcommand_submit() -> Command {
    return Command::new("submit")
        .about("Send a message to a session and print the reply with the updated graph as JSON. A new session is created when no ID is given.")
        .arg(arg_session_id().env("PIPESMITH_SESSION_ID"))
        .arg(
            Arg::new("history")
                .long("history")
                .help("Path to a JSON array of {\"role\", \"content\"} entries used to seed a new session.")
                .num_args(1),
        )
        .arg(
            Arg::new("message")
                .help("The message to send.")
                .required(true),
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Manage past sessions.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the sessions directory path."))
        .subcommand(Command::new("list").about("List all previous sessions with their ids and first message."))
        .subcommand(
            Command::new("show")
                .about("Print the latest reply and current scripts of a session.")
                .arg(arg_session_id().required(true)),
        );
}

fn arg_backend() -> Arg {
    return Arg::new(ConfigKey::Backend.to_string())
        .short('b')
        .long(ConfigKey::Backend.to_string())
        .env("PIPESMITH_BACKEND")
        .num_args(1)
        .help(format!(
            "The backend hosting the model that generates scripts, graphs and descriptions. [default: {}]",
            Config::default(ConfigKey::Backend)
        ))
        .value_parser(PossibleValuesParser::new(BackendName::VARIANTS))
        .global(true);
}

fn arg_backend_health_check_timeout() -> Arg {
    return Arg::new(ConfigKey::BackendHealthCheckTimeout.to_string())
        .long(ConfigKey::BackendHealthCheckTimeout.to_string())
        .env("PIPESMITH_BACKEND_HEALTH_CHECK_TIMEOUT")
        .num_args(1)
        .help(
            format!("Time to wait in milliseconds before timing out when doing a healthcheck for a backend. [default: {}]", Config::default(ConfigKey::BackendHealthCheckTimeout)),
        )
        .global(true);
}

fn arg_backend_timeout() -> Arg {
    return Arg::new(ConfigKey::BackendTimeout.to_string())
        .long(ConfigKey::BackendTimeout.to_string())
        .env("PIPESMITH_BACKEND_TIMEOUT")
        .num_args(1)
        .help(
            format!("Time to wait in milliseconds for a single completion before giving up. [default: {}]", Config::default(ConfigKey::BackendTimeout)),
        )
        .global(true);
}

fn arg_model() -> Arg {
    return Arg::new(ConfigKey::Model.to_string())
        .short('m')
        .long(ConfigKey::Model.to_string())
        .env("PIPESMITH_MODEL")
        .num_args(1)
        .help("The model on the backend to use. Each backend falls back to its own default model if not set.")
        .global(true);
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("pipesmith")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .subcommand(Command::new("health").about("Checks the configured backend is reachable."))
        .subcommand(Command::new("manpages").about("Generates manpages and outputs to stdout."))
        .subcommand(Command::new("models").about("Lists the models available on the configured backend."))
        .subcommand(subcommand_sessions())
        .subcommand(subcommand_submit())
        .arg(arg_backend())
        .arg(arg_backend_health_check_timeout())
        .arg(arg_backend_timeout())
        .arg(arg_model())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("PIPESMITH_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::SessionsDir.to_string())
                .long(ConfigKey::SessionsDir.to_string())
                .env("PIPESMITH_SESSIONS_DIR")
                .num_args(1)
                .help(format!("Directory holding one sub directory per session. [default: {}]", Config::default(ConfigKey::SessionsDir)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::MirrorDir.to_string())
                .long(ConfigKey::MirrorDir.to_string())
                .env("PIPESMITH_MIRROR_DIR")
                .num_args(1)
                .help("Directory the published graph and descriptions are copied to for the web tier. Mirroring is skipped if not set.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::MirrorLayout.to_string())
                .long(ConfigKey::MirrorLayout.to_string())
                .env("PIPESMITH_MIRROR_LAYOUT")
                .num_args(1)
                .help(format!("Whether every session publishes to the same mirror files or to a sub directory named after the session. [default: {}]", Config::default(ConfigKey::MirrorLayout)))
                .value_parser(PossibleValuesParser::new(MirrorLayout::VARIANTS))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::HistoryTokenBudget.to_string())
                .long(ConfigKey::HistoryTokenBudget.to_string())
                .env("PIPESMITH_HISTORY_TOKEN_BUDGET")
                .num_args(1)
                .help(format!("Approximate number of tokens of conversation history kept per session. [default: {}]", Config::default(ConfigKey::HistoryTokenBudget)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OllamaURL.to_string())
                .long(ConfigKey::OllamaURL.to_string())
                .env("PIPESMITH_OLLAMA_URL")
                .num_args(1)
                .help(format!("Ollama API URL when using the Ollama backend. [default: {}]", Config::default(ConfigKey::OllamaURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OpenAiURL.to_string())
                .long(ConfigKey::OpenAiURL.to_string())
                .env("PIPESMITH_OPENAI_URL")
                .num_args(1)
                .help(format!("OpenAI API URL when using the OpenAI backend. Can be swapped to a compatible proxy. [default: {}]", Config::default(ConfigKey::OpenAiURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OpenAiToken.to_string())
                .long(ConfigKey::OpenAiToken.to_string())
                .env("PIPESMITH_OPENAI_TOKEN")
                .num_args(1)
                .help("OpenAI API token when using the OpenAI backend.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ClaudeToken.to_string())
                .long(ConfigKey::ClaudeToken.to_string())
                .env("PIPESMITH_CLAUDE_TOKEN")
                .num_args(1)
                .help("Anthropic's Claude API token when using the Claude backend.")
                .global(true),
        );
}

pub async fn parse() -> Result<()> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => match debug_matches.subcommand() {
            Some(("log-path", _)) => {
                let log_path = Config::log_dir().join("debug.log");
                println!("{}", log_path.to_string_lossy());
            }
            Some(("enum-config", _)) => {
                let res = ConfigKey::VARIANTS.join("\n");
                println!("{}", res);
            }
            _ => {
                subcommand_debug().print_long_help()?;
            }
        },
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
            }
            _ => {
                subcommand_config().print_long_help()?;
            }
        },
        Some(("manpages", _)) => {
            clap_mangen::Man::new(build()).render(&mut io::stdout())?;
        }
        Some(("health", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            print_health().await?;
        }
        Some(("models", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            print_models().await?;
        }
        Some(("sessions", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("dir", dir_matches)) => {
                Config::load(build(), vec![&matches, subcmd_matches, dir_matches]).await?;
                println!("{}", Config::get(ConfigKey::SessionsDir));
            }
            Some(("list", list_matches)) => {
                Config::load(build(), vec![&matches, subcmd_matches, list_matches]).await?;
                print_sessions_list().await?;
            }
            Some(("show", show_matches)) => {
                Config::load(build(), vec![&matches, subcmd_matches, show_matches]).await?;
                print_session(&Config::get(ConfigKey::SessionID)).await?;
            }
            _ => {
                subcommand_sessions().print_long_help()?;
            }
        },
        Some(("submit", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            submit(subcmd_matches).await?;
        }
        _ => {
            build().print_long_help()?;
        }
    }

    return Ok(());
}
