//! Static web-site building agent powered by tagloop.
//!
//! Sessions live in `<workdir>/.tagloop/`. Use `init` to create one, then
//! `run` for a full autonomous session or `chat` for a single bridged
//! interaction. The live backend reads its API key from `OPENROUTER_KEY`.
//!
//! # Examples
//!
//! ```sh
//! tagloop-site --workdir site init --instruction "Build a portfolio page"
//! tagloop-site --workdir site run
//! tagloop-site --workdir site chat --message "Make the header blue" --json
//! tagloop-site --workdir site wireframe layout.json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use serde_json::{Value, json};
use tagloop::agent::env::AgentEnvironment;
use tagloop::agent::harness::RunOutcome;
use tagloop::agent::prompt::tool_catalog;
use tagloop::llm::retry::RetryConfig;
use tagloop::tools::{ToolArgs, ToolRegistry};
use tagloop_site::bridge::{self, ChatOptions, MAX_SUB_TURNS};
use tagloop_site::config::{ScaffoldOptions, SiteConfig, scaffold};
use tagloop_site::tools::{LAYOUT_WIREFRAME, catalog};
use tagloop_site::wireframe::Wireframe;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Static web-site building agent powered by tagloop.
#[derive(Parser)]
#[command(name = "tagloop-site", version)]
struct Cli {
    /// Working directory holding the site and its .tagloop/ session.
    #[arg(long, default_value = ".", global = true)]
    workdir: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Record full LLM payloads in .tagloop/agent.log.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create .tagloop/config.json and .tagloop/instruction.md.
    Init {
        /// Initial instruction for the agent.
        #[arg(long)]
        instruction: Option<String>,
        /// LLM backend: mock or openrouter.
        #[arg(long, default_value = "mock")]
        llm: String,
        /// Overwrite existing files.
        #[arg(long)]
        force: bool,
    },
    /// Run the agent until it terminates or exhausts max_turns.
    Run,
    /// Send one message and print the reply.
    Chat {
        #[arg(long)]
        message: String,
        /// Turns allowed before replying.
        #[arg(long, default_value_t = MAX_SUB_TURNS)]
        max_sub_turns: u32,
        /// Retries for rate-limited or transient LLM failures.
        #[arg(long, default_value_t = 2)]
        retries: u32,
        /// Print the reply and file snapshot as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Render a wireframe JSON file into index.html and style.css.
    Wireframe {
        /// JSON file: {"sections": [...]} or a bare array of sections.
        file: PathBuf,
    },
    /// List the tools enabled for this session.
    Tools,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(level);
    tracing_subscriber::registry().with(layer).init();
}

async fn run(cli: Cli) -> Result<(), String> {
    let site = SiteConfig {
        workdir: cli.workdir,
        debug: cli.debug,
        ..Default::default()
    };

    match cli.command {
        Command::Init {
            instruction,
            llm,
            force,
        } => {
            let options = ScaffoldOptions {
                instruction,
                llm_type: Some(llm),
                force,
            };
            let written = scaffold(&site.workdir, &options)?;
            if written.is_empty() {
                println!("Session already initialized (use --force to overwrite)");
            }
            for path in written {
                println!("wrote {}", path.display());
            }
            Ok(())
        }
        Command::Run => {
            let mut agent = site.build_agent().map_err(|e| e.to_string())?;
            match agent.run().await.map_err(|e| e.to_string())? {
                RunOutcome::Terminated { turns } => println!("Terminated after {turns} turns"),
                RunOutcome::BudgetExhausted { turns } => {
                    println!("Stopped: turn budget of {turns} exhausted")
                }
            }
            Ok(())
        }
        Command::Chat {
            message,
            max_sub_turns,
            retries,
            json,
        } => {
            let mut agent = site.build_agent().map_err(|e| e.to_string())?;
            let options = ChatOptions {
                max_sub_turns,
                retry: RetryConfig::with_retries(retries),
            };
            let reply = bridge::chat(&mut agent, &message, &options)
                .await
                .map_err(|e| e.to_string())?;
            if json {
                let out = serde_json::to_string_pretty(&reply)
                    .map_err(|e| format!("failed to serialize reply: {e}"))?;
                println!("{out}");
            } else {
                println!("{}", reply.reply);
                for path in reply.files.keys() {
                    println!("  {path}");
                }
            }
            Ok(())
        }
        Command::Wireframe { file } => {
            let sections = read_wireframe(&file)?;
            let mut agent = site.build_agent().map_err(|e| e.to_string())?;
            let mut args = ToolArgs::new();
            args.insert("sections".into(), sections);
            let record = agent.dispatch(LAYOUT_WIREFRAME, args).await;
            if let Some(error) = record.error {
                return Err(error);
            }
            let files = record
                .result
                .map(|r| r["data"]["files"].clone())
                .unwrap_or(Value::Null);
            println!("{files}");
            Ok(())
        }
        Command::Tools => {
            let env = AgentEnvironment::load(&site.workdir).map_err(|e| e.to_string())?;
            let registry = ToolRegistry::from_catalog(&env, catalog(), env.config().allowed_tools())?;
            println!("{}", tool_catalog(&registry));
            Ok(())
        }
    }
}

/// Load a wireframe file and return its sections as a JSON array.
fn read_wireframe(path: &Path) -> Result<Value, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let value: Value = serde_json::from_str(&data)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
    Wireframe::from_value(&value)?;
    Ok(match value {
        Value::Object(mut obj) => obj.remove("sections").unwrap_or_else(|| json!([])),
        other => other,
    })
}
