//! Page registry (`page.*`).
//!
//! Maps a page name to its route, title and the components it uses.
//! Registering an existing name replaces its entry.

use crate::store;
use crate::tools::{PAGE_LIST, PAGE_REGISTER};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tagloop::agent::env::AgentEnvironment;
use tagloop::tools::{Tool, ToolArgs, ToolError, ToolFuture, ToolOutput, ToolSchema, parse_tool_args};
use tracing::debug;

/// Registry file inside the session directory.
pub const PAGES_FILE: &str = "pages.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    pub route: String,
    pub title: String,
    #[serde(default)]
    pub components: Vec<String>,
}

pub type PageRegistry = BTreeMap<String, PageEntry>;

/// Route for a page registered without one: `/` plus the name without a
/// trailing `.html`, except that `index` maps to `/`.
pub fn default_route(name: &str) -> String {
    let stem = name.strip_suffix(".html").unwrap_or(name);
    if stem == "index" {
        "/".to_string()
    } else {
        format!("/{}", stem.trim_start_matches('/'))
    }
}

fn bound<'a>(registry: &'a Option<PathBuf>, name: &str) -> Result<&'a PathBuf, ToolError> {
    registry
        .as_ref()
        .ok_or_else(|| ToolError::NotInitialized(name.to_string()))
}

#[derive(Deserialize, JsonSchema)]
pub struct RegisterArgs {
    /// Page name (e.g. 'about' or 'about.html').
    pub name: String,
    /// URL route (default '/' + name).
    #[serde(default)]
    pub route: Option<String>,
    /// Page title (default: the name).
    #[serde(default)]
    pub title: Option<String>,
    /// Names of components used on the page.
    #[serde(default)]
    pub components: Option<Vec<String>>,
}

// ── RegisterPage ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RegisterPage {
    registry: Option<PathBuf>,
}

impl Tool for RegisterPage {
    fn name(&self) -> &str {
        PAGE_REGISTER
    }

    fn description(&self) -> String {
        "Register (or replace) a page with its route, title and components.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<RegisterArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.registry = Some(env.session_file(PAGES_FILE));
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<RegisterArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let path = bound(&self.registry, PAGE_REGISTER)?;

            let entry = PageEntry {
                route: args.route.unwrap_or_else(|| default_route(&args.name)),
                title: args.title.unwrap_or_else(|| args.name.clone()),
                components: args.components.unwrap_or_default(),
            };
            let mut registry: PageRegistry = store::load_or_default(path);
            let replaced = registry.insert(args.name.clone(), entry.clone()).is_some();
            store::save_atomic(path, &registry).map_err(ToolError::Failed)?;
            debug!("Page '{}' registered at {}", args.name, entry.route);

            Ok(ToolOutput::success(json!({
                "name": args.name,
                "page": entry,
                "replaced": replaced,
            })))
        })
    }
}

// ── ListPages ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct ListPages {
    registry: Option<PathBuf>,
}

impl Tool for ListPages {
    fn name(&self) -> &str {
        PAGE_LIST
    }

    fn description(&self) -> String {
        "List registered pages.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.registry = Some(env.session_file(PAGES_FILE));
        Ok(())
    }

    fn execute(&self, _args: &ToolArgs) -> ToolFuture<'_> {
        Box::pin(async move {
            let path = bound(&self.registry, PAGE_LIST)?;
            let registry: PageRegistry = store::load_or_default(path);
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
        let catalog: Vec<Box<dyn Tool>> =
            vec![Box::new(RegisterPage::default()), Box::new(ListPages::default())];
        ToolRegistry::from_catalog(&env, catalog, None).unwrap()
    }

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn default_routes() {
        assert_eq!(default_route("about"), "/about");
        assert_eq!(default_route("about.html"), "/about");
        assert_eq!(default_route("index"), "/");
        assert_eq!(default_route("index.html"), "/");
    }

    #[tokio::test]
    async fn defaults_fill_route_and_title() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let record = registry
            .dispatch(PAGE_REGISTER, args(json!({"name": "contact.html"})))
            .await;
        let page = record.result.unwrap()["data"]["page"].clone();
        assert_eq!(page["route"], "/contact");
        assert_eq!(page["title"], "contact.html");
        assert_eq!(page["components"], json!([]));
    }

    #[tokio::test]
    async fn null_optionals_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let record = registry
            .dispatch(
                PAGE_REGISTER,
                args(json!({"name": "about", "route": null, "title": null})),
            )
            .await;
        assert!(record.succeeded(), "{:?}", record.error);
        let page = record.result.unwrap()["data"]["page"].clone();
        assert_eq!(page["route"], "/about");
        assert_eq!(page["title"], "about");
    }

    #[tokio::test]
    async fn reregistering_replaces_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry
            .dispatch(
                PAGE_REGISTER,
                args(json!({"name": "home", "route": "/", "title": "Home"})),
            )
            .await;
        registry
            .dispatch(
                PAGE_REGISTER,
                args(json!({"name": "home", "route": "/home", "title": "Welcome", "components": ["navbar"]})),
            )
            .await;

        let listed = registry.dispatch(PAGE_LIST, ToolArgs::new()).await;
        let data = listed.result.unwrap()["data"].clone();
        assert_eq!(data.as_object().unwrap().len(), 1);
        assert_eq!(data["home"]["route"], "/home");
        assert_eq!(data["home"]["title"], "Welcome");
        assert_eq!(data["home"]["components"], json!(["navbar"]));
    }

    #[tokio::test]
    async fn components_must_be_a_list() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let record = registry
            .dispatch(PAGE_REGISTER, args(json!({"name": "home", "components": "navbar"})))
            .await;
        assert!(
            record
                .error
                .unwrap()
                .starts_with("Argument validation failed:")
        );
    }
}
