//! Session configuration and the agent environment.
//!
//! A session lives in a working directory with a hidden
//! [`SESSION_DIR`](crate::SESSION_DIR) holding `config.json`,
//! `instruction.md`, `agent.log` and the JSON registries. The
//! [`AgentEnvironment`] bundles the canonical root, the parsed
//! [`SessionConfig`] and the [`Sandbox`] every file tool is bound to.

use crate::agent::harness::InitError;
use crate::tools::sandbox::{PathPolicy, Sandbox};
use crate::{CONFIG_FILE, INSTRUCTION_FILE, LOG_FILE, SESSION_DIR};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Turn budget when `max_turns` is not configured.
pub const DEFAULT_MAX_TURNS: u32 = 50;

/// LLM selection when `llm_type` is not configured.
pub const DEFAULT_LLM_TYPE: &str = "mock";

// ── SessionConfig ──────────────────────────────────────────────────

/// Contents of `.tagloop/config.json`. Every field is optional.
///
/// Keys not modelled here are kept in `extra` and remain reachable through
/// [`SessionConfig::value`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// `"mock"` (default) or `"openrouter"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_type: Option<String>,
    /// Model identifier for the live backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Turn budget for [`Agent::run`](crate::agent::harness::Agent::run).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Tool allow-list. Absent or empty enables every catalog tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    /// Globs that block writes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protected_files: Vec<String>,
    /// Globs that force-allow writes, overriding `protected_files`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub writable_paths: Vec<String>,
    /// Scripted replies for the mock model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_responses: Option<Vec<String>>,
    /// Completion token cap for the live backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature for the live backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, InitError> {
        if !path.exists() {
            return Err(InitError::MissingConfig(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let config: SessionConfig =
            serde_json::from_str(&data).map_err(|e| InitError::InvalidConfig(e.to_string()))?;
        debug!("Loaded session config from {}", path.display());
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize config: {e}"))?;
        std::fs::write(path, data).map_err(|e| format!("failed to write config: {e}"))
    }

    /// Normalized LLM selection (lowercase, default `mock`).
    pub fn llm_type(&self) -> String {
        self.llm_type
            .as_deref()
            .unwrap_or(DEFAULT_LLM_TYPE)
            .trim()
            .to_lowercase()
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns.unwrap_or(DEFAULT_MAX_TURNS)
    }

    /// The allow-list, or `None` when every tool is enabled.
    pub fn allowed_tools(&self) -> Option<&[String]> {
        self.allowed_tools
            .as_deref()
            .filter(|names| !names.is_empty())
    }

    /// Raw lookup of any top-level key, modelled or not.
    pub fn value(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.extra.get(key) {
            return Some(v.clone());
        }
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut(key).map(Value::take))
    }

    /// Raw lookup with a fallback.
    pub fn value_or(&self, key: &str, default: Value) -> Value {
        self.value(key).unwrap_or(default)
    }
}

// ── AgentEnvironment ───────────────────────────────────────────────

/// Working-directory root, configuration and sandbox for one session.
#[derive(Debug, Clone)]
pub struct AgentEnvironment {
    config: SessionConfig,
    sandbox: Sandbox,
}

impl AgentEnvironment {
    /// Build an environment from an explicit config.
    ///
    /// The path policy comes from the config plus the process-level
    /// overrides (see [`PathPolicy::from_config`]).
    pub fn new(root: &Path, config: SessionConfig) -> Result<Self, String> {
        let policy = PathPolicy::from_config(&config);
        Self::with_policy(root, config, policy)
    }

    /// Build an environment with an explicit path policy.
    pub fn with_policy(root: &Path, config: SessionConfig, policy: PathPolicy) -> Result<Self, String> {
        let sandbox = Sandbox::new(root, policy)?;
        Ok(Self { config, sandbox })
    }

    /// Load `<root>/.tagloop/config.json`. A missing file is fatal.
    pub fn load(root: &Path) -> Result<Self, InitError> {
        let config = SessionConfig::load(&session_dir(root).join(CONFIG_FILE))?;
        Self::new(root, config).map_err(InitError::InvalidConfig)
    }

    /// Canonical working-directory root.
    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Config lookup with a default, for keys tools read themselves.
    pub fn config_value(&self, key: &str, default: Value) -> Value {
        self.config.value_or(key, default)
    }

    /// `<root>/.tagloop`.
    pub fn session_dir(&self) -> PathBuf {
        session_dir(self.root())
    }

    /// A file inside the session directory.
    pub fn session_file(&self, name: &str) -> PathBuf {
        self.session_dir().join(name)
    }

    pub fn instruction_path(&self) -> PathBuf {
        self.session_file(INSTRUCTION_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.session_file(LOG_FILE)
    }
}

/// `<root>/.tagloop` for a root that may not be canonical yet.
pub fn session_dir(root: &Path) -> PathBuf {
    root.join(SESSION_DIR)
}
