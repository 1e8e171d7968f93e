//! Site-agent configuration and session scaffolding.
//!
//! [`SiteConfig`] turns CLI-level settings into a ready
//! [`AgentBuilder`] with the site tool catalog and prompt guidance.
//! [`scaffold`] writes the `.tagloop/` files a session needs to start.

use crate::prompt::{SITE_IDENTITY, site_guidance};
use crate::tools::catalog;
use std::path::{Path, PathBuf};
use tagloop::agent::env::{DEFAULT_MAX_TURNS, SessionConfig, session_dir};
use tagloop::agent::harness::{Agent, AgentBuilder, InitError};
use tagloop::{CONFIG_FILE, INSTRUCTION_FILE};
use tracing::info;

/// Instruction written when `init` is given none.
pub const DEFAULT_INSTRUCTION: &str = "Interactive Web Session";

/// Globs protected in a freshly scaffolded config.
pub const DEFAULT_PROTECTED: &[&str] = &[".tagloop/*", ".git/*"];

/// Settings for one site session.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Working directory. Default: `"."`.
    pub workdir: PathBuf,
    /// Record full LLM payloads in `agent.log`. Default: `false`.
    pub debug: bool,
    /// Append to `agent.log`. Default: `true`.
    pub file_log: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            debug: false,
            file_log: true,
        }
    }
}

impl SiteConfig {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Default::default()
        }
    }

    /// A builder preloaded with the site catalog, identity and guidance.
    ///
    /// Callers may still override the model, instruction or config before
    /// building.
    pub fn agent_builder(&self) -> AgentBuilder {
        Agent::builder(self.workdir.clone())
            .with_tools(catalog())
            .with_identity(SITE_IDENTITY)
            .with_guidance(site_guidance())
            .with_file_log(self.file_log)
            .with_debug(self.debug)
    }

    /// Build a session from the files under `.tagloop/`.
    pub fn build_agent(&self) -> Result<Agent, InitError> {
        self.agent_builder().build()
    }
}

/// Options for [`scaffold`].
#[derive(Debug, Clone, Default)]
pub struct ScaffoldOptions {
    /// Text for `instruction.md`. Default: [`DEFAULT_INSTRUCTION`].
    pub instruction: Option<String>,
    /// `llm_type` for the config. Default: `"mock"`.
    pub llm_type: Option<String>,
    /// Overwrite existing files.
    pub force: bool,
}

/// Write `.tagloop/config.json` and `.tagloop/instruction.md` under
/// `workdir`. Existing files are kept unless `force` is set. Returns the
/// files written.
pub fn scaffold(workdir: &Path, options: &ScaffoldOptions) -> Result<Vec<PathBuf>, String> {
    let dir = session_dir(workdir);
    std::fs::create_dir_all(&dir).map_err(|e| format!("failed to create {}: {e}", dir.display()))?;
    let mut written = Vec::new();

    let config_path = dir.join(CONFIG_FILE);
    if options.force || !config_path.exists() {
        let config = SessionConfig {
            llm_type: Some(options.llm_type.clone().unwrap_or_else(|| "mock".into())),
            max_turns: Some(DEFAULT_MAX_TURNS),
            protected_files: DEFAULT_PROTECTED.iter().map(|s| (*s).to_string()).collect(),
            ..Default::default()
        };
        config.save(&config_path)?;
        written.push(config_path);
    }

    let instruction_path = dir.join(INSTRUCTION_FILE);
    if options.force || !instruction_path.exists() {
        let text = options.instruction.as_deref().unwrap_or(DEFAULT_INSTRUCTION);
        std::fs::write(&instruction_path, text)
            .map_err(|e| format!("failed to write {INSTRUCTION_FILE}: {e}"))?;
        written.push(instruction_path);
    }

    info!("Scaffolded {} ({} files written)", dir.display(), written.len());
    Ok(written)
}
