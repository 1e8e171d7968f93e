//! Component registry (`component.*`).
//!
//! Maps a component name to the file that implements it. Registering an
//! existing name replaces its entry.

use crate::store;
use crate::tools::{COMPONENT_LIST, COMPONENT_REGISTER};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tagloop::agent::env::AgentEnvironment;
use tagloop::tools::{Tool, ToolArgs, ToolError, ToolFuture, ToolOutput, ToolSchema, parse_tool_args};
use tracing::debug;

/// Registry file inside the session directory.
pub const COMPONENTS_FILE: &str = "components.json";

/// Directory created in the working directory for component sources.
pub const COMPONENTS_DIR: &str = "components";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub path: String,
    #[serde(default)]
    pub description: String,
}

pub type ComponentRegistry = BTreeMap<String, ComponentEntry>;

/// Paths the component tools are bound to.
#[derive(Debug, Clone)]
struct Bound {
    registry: PathBuf,
    components_dir: PathBuf,
}

impl Bound {
    fn from_env(env: &AgentEnvironment) -> Self {
        Self {
            registry: env.session_file(COMPONENTS_FILE),
            components_dir: env.root().join(COMPONENTS_DIR),
        }
    }
}

fn bound<'a>(paths: &'a Option<Bound>, name: &str) -> Result<&'a Bound, ToolError> {
    paths
        .as_ref()
        .ok_or_else(|| ToolError::NotInitialized(name.to_string()))
}

#[derive(Deserialize, JsonSchema)]
pub struct RegisterArgs {
    /// Component name (e.g. 'navbar').
    pub name: String,
    /// File implementing the component, relative to the working directory.
    pub path: String,
    /// What the component is for.
    #[serde(default)]
    pub description: Option<String>,
}

// ── RegisterComponent ──────────────────────────────────────────────

#[derive(Default)]
pub struct RegisterComponent {
    paths: Option<Bound>,
}

impl Tool for RegisterComponent {
    fn name(&self) -> &str {
        COMPONENT_REGISTER
    }

    fn description(&self) -> String {
        "Register (or replace) a reusable component by name.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<RegisterArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.paths = Some(Bound::from_env(env));
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<RegisterArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let paths = bound(&self.paths, COMPONENT_REGISTER)?;
            tokio::fs::create_dir_all(&paths.components_dir).await?;

            let entry = ComponentEntry {
                path: args.path,
                description: args.description.unwrap_or_default(),
            };
            let mut registry: ComponentRegistry = store::load_or_default(&paths.registry);
            let replaced = registry.insert(args.name.clone(), entry.clone()).is_some();
            store::save_atomic(&paths.registry, &registry).map_err(ToolError::Failed)?;
            debug!("Component '{}' registered (replaced={replaced})", args.name);

            Ok(ToolOutput::success(json!({
                "name": args.name,
                "component": entry,
                "replaced": replaced,
            })))
        })
    }
}

// ── ListComponents ─────────────────────────────────────────────────

#[derive(Default)]
pub struct ListComponents {
    paths: Option<Bound>,
}

impl Tool for ListComponents {
    fn name(&self) -> &str {
        COMPONENT_LIST
    }

    fn description(&self) -> String {
        "List registered components.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.paths = Some(Bound::from_env(env));
        Ok(())
    }

    fn execute(&self, _args: &ToolArgs) -> ToolFuture<'_> {
        Box::pin(async move {
            let paths = bound(&self.paths, COMPONENT_LIST)?;
            let registry: ComponentRegistry = store::load_or_default(&paths.registry);
            Ok(ToolOutput::success(json!(registry)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagloop::agent::env::SessionConfig;
    use tagloop::tools::ToolRegistry;

    fn registry(dir: &std::path::Path) -> ToolRegistry {
        let env = AgentEnvironment::new(dir, SessionConfig::default()).unwrap();
        let catalog: Vec<Box<dyn Tool>> = vec![
            Box::new(RegisterComponent::default()),
            Box::new(ListComponents::default()),
        ];
        ToolRegistry::from_catalog(&env, catalog, None).unwrap()
    }

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn reregistering_replaces_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let first = registry
            .dispatch(
                COMPONENT_REGISTER,
                args(json!({"name": "navbar", "path": "components/nav.html", "description": "v1"})),
            )
            .await;
        assert_eq!(first.result.unwrap()["data"]["replaced"], false);

        let second = registry
            .dispatch(
                COMPONENT_REGISTER,
                args(json!({"name": "navbar", "path": "components/navbar.html", "description": "v2"})),
            )
            .await;
        assert_eq!(second.result.unwrap()["data"]["replaced"], true);

        let listed = registry.dispatch(COMPONENT_LIST, ToolArgs::new()).await;
        let data = listed.result.unwrap()["data"].clone();
        let map = data.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(data["navbar"]["path"], "components/navbar.html");
        assert_eq!(data["navbar"]["description"], "v2");
    }

    #[tokio::test]
    async fn register_creates_components_dir() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry
            .dispatch(
                COMPONENT_REGISTER,
                args(json!({"name": "hero", "path": "components/hero.html"})),
            )
            .await;
        assert!(dir.path().join(COMPONENTS_DIR).is_dir());
    }

    #[tokio::test]
    async fn corrupt_registry_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let session = dir.path().join(".tagloop");
        std::fs::create_dir_all(&session).unwrap();
        std::fs::write(session.join(COMPONENTS_FILE), "[1, 2").unwrap();

        let listed = registry.dispatch(COMPONENT_LIST, ToolArgs::new()).await;
        assert_eq!(listed.result.unwrap()["data"], json!({}));
    }
}
