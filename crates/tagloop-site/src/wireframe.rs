//! Wireframe layout templating.
//!
//! A wireframe is an ordered list of sections, each a JSON object with a
//! `type` and a few optional fields. [`render_wireframe`] turns it into a
//! static `index.html` plus a shared `style.css`; the `layout.wireframe`
//! tool writes both into the working directory.
//!
//! | Type | Fields (default) |
//! |------|------------------|
//! | `navbar` | `links` (`["Home"]`) |
//! | `hero` | `title` (`"Hero Title"`), `subtitle`, `backgroundImage` |
//! | `footer` | `text` (`"Footer Text"`) |
//! | `grid` | `items` (3) |
//! | `sidebar` | `links` (`["Link 1", "Link 2"]`) |
//! | `form` | `fields` (`["Name", "Email"]`) |
//! | `gallery` | `images` (3) |
//!
//! Any other type renders as a placeholder section. All text is
//! HTML-escaped.

use crate::tools::LAYOUT_WIREFRAME;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tagloop::agent::env::AgentEnvironment;
use tagloop::tools::{
    Sandbox, Tool, ToolArgs, ToolError, ToolFuture, ToolOutput, ToolSchema, parse_tool_args,
};
use tracing::debug;

pub const INDEX_FILE: &str = "index.html";
pub const STYLE_FILE: &str = "style.css";

/// Upper bound on `items`/`images` counts.
pub const MAX_REPEAT: u64 = 100;

const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

const STYLESHEET: &str = "\
body { font-family: sans-serif; margin: 0; padding: 0; }
.navbar { background: #333; color: white; padding: 1rem; }
.navbar a { color: white; margin-right: 1rem; text-decoration: none; }
.hero { background: #f4f4f4; padding: 4rem 2rem; text-align: center; }
.footer { background: #333; color: white; padding: 1rem; text-align: center; margin-top: 2rem; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 1rem; padding: 2rem; }
.card { border: 1px solid #ddd; padding: 1rem; border-radius: 4px; }
.sidebar { width: 250px; background: #f0f0f0; padding: 1rem; float: left; }
.form { max-width: 600px; margin: 2rem auto; padding: 1rem; border: 1px solid #ccc; }
.form-group { margin-bottom: 1rem; }
.form-group label { display: block; margin-bottom: 0.5rem; }
.form-group input { width: 100%; padding: 0.5rem; }
.gallery { display: flex; flex-wrap: wrap; gap: 1rem; padding: 2rem; }
.gallery-item img { max-width: 100%; height: auto; }
.generic-section { padding: 2rem; border: 1px dashed #ccc; margin: 1rem; text-align: center; }
";

// ── Model ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Navbar { links: Vec<String> },
    Hero {
        title: String,
        subtitle: String,
        background_image: Option<String>,
    },
    Footer { text: String },
    Grid { items: u64 },
    Sidebar { links: Vec<String> },
    Form { fields: Vec<String> },
    Gallery { images: u64 },
    /// Unrecognized type, rendered as a placeholder.
    Other(String),
}

impl Section {
    /// Interpret one section object. Missing fields take their defaults.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("section must be an object, got {value}"))?;
        let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();

        let section = match kind {
            "navbar" => Section::Navbar {
                links: strings(value, "links", &["Home"]),
            },
            "hero" => Section::Hero {
                title: text(value, "title", "Hero Title"),
                subtitle: text(value, "subtitle", ""),
                background_image: Some(text(value, "backgroundImage", ""))
                    .filter(|s| !s.is_empty()),
            },
            "footer" => Section::Footer {
                text: text(value, "text", "Footer Text"),
            },
            "grid" => Section::Grid {
                items: count(value, "items", 3),
            },
            "sidebar" => Section::Sidebar {
                links: strings(value, "links", &["Link 1", "Link 2"]),
            },
            "form" => Section::Form {
                fields: strings(value, "fields", &["Name", "Email"]),
            },
            "gallery" => Section::Gallery {
                images: count(value, "images", 3),
            },
            other => Section::Other(other.to_string()),
        };
        Ok(section)
    }
}

/// An ordered list of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wireframe {
    pub sections: Vec<Section>,
}

impl Wireframe {
    /// Accept `{"sections": [...]}` or a bare array of sections.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let sections = match value {
            Value::Array(items) => items.as_slice(),
            Value::Object(obj) => match obj.get("sections") {
                Some(Value::Array(items)) => items.as_slice(),
                Some(_) => return Err("'sections' must be an array".into()),
                None => &[],
            },
            _ => return Err("wireframe must be an object or an array".into()),
        };
        Self::from_sections(sections)
    }

    pub fn from_sections(sections: &[Value]) -> Result<Self, String> {
        let sections = sections
            .iter()
            .enumerate()
            .map(|(i, s)| Section::from_value(s).map_err(|e| format!("section {i}: {e}")))
            .collect::<Result<_, _>>()?;
        Ok(Self { sections })
    }
}

fn text(value: &Value, key: &str, default: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

fn strings(value: &Value, key: &str, default: &[&str]) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

fn count(value: &Value, key: &str, default: u64) -> u64 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .unwrap_or(default)
        .min(MAX_REPEAT)
}

// ── Rendering ──────────────────────────────────────────────────────

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => "Section".to_string(),
    }
}

fn render_section(section: &Section) -> String {
    let mut html = String::new();
    match section {
        Section::Navbar { links } => {
            html.push_str(r#"<nav class="navbar">"#);
            for link in links {
                let _ = write!(html, r##"<a href="#">{}</a>"##, escape_html(link));
            }
            html.push_str("</nav>");
        }
        Section::Hero {
            title,
            subtitle,
            background_image,
        } => {
            let style = background_image
                .as_deref()
                .map(|url| {
                    format!(
                        r#" style="background-image: url('{}'); background-size: cover;""#,
                        escape_html(url)
                    )
                })
                .unwrap_or_default();
            let _ = write!(
                html,
                r#"<header class="hero"{style}><h1>{}</h1><p>{}</p></header>"#,
                escape_html(title),
                escape_html(subtitle)
            );
        }
        Section::Footer { text } => {
            let _ = write!(html, r#"<footer class="footer"><p>{}</p></footer>"#, escape_html(text));
        }
        Section::Grid { items } => {
            html.push_str(r#"<section class="grid">"#);
            for i in 1..=*items {
                let _ = write!(html, r#"<div class="card">Item {i}</div>"#);
            }
            html.push_str("</section>");
        }
        Section::Sidebar { links } => {
            html.push_str(r#"<aside class="sidebar"><ul>"#);
            for link in links {
                let _ = write!(html, r##"<li><a href="#">{}</a></li>"##, escape_html(link));
            }
            html.push_str("</ul></aside>");
        }
        Section::Form { fields } => {
            html.push_str(r#"<form class="form">"#);
            for field in fields {
                let field = escape_html(field);
                let _ = write!(
                    html,
                    r#"<div class="form-group"><label>{field}</label><input type="text" placeholder="{field}"></div>"#
                );
            }
            html.push_str(r#"<button type="submit">Submit</button></form>"#);
        }
        Section::Gallery { images } => {
            html.push_str(r#"<section class="gallery">"#);
            for i in 1..=*images {
                let _ = write!(
                    html,
                    r#"<div class="gallery-item"><img src="{PLACEHOLDER_IMAGE}" alt="Image {i}"></div>"#
                );
            }
            html.push_str("</section>");
        }
        Section::Other(kind) => {
            let label = if kind.is_empty() { "section" } else { kind };
            let _ = write!(
                html,
                r#"<section class="generic-section"><h2>{}</h2><p>Placeholder for {}</p></section>"#,
                escape_html(&capitalize(kind)),
                escape_html(label)
            );
        }
    }
    html
}

/// Render the page and stylesheet, keyed by file name.
pub fn render_wireframe(wireframe: &Wireframe) -> BTreeMap<String, String> {
    let mut body = String::new();
    for section in &wireframe.sections {
        body.push_str(&render_section(section));
        body.push('\n');
    }
    let page = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n    \
         <meta charset=\"UTF-8\">\n    \
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    \
         <title>Generated Wireframe</title>\n    \
         <link rel=\"stylesheet\" href=\"{STYLE_FILE}\">\n\
         </head>\n\
         <body>\n\
         {body}\
         </body>\n\
         </html>\n"
    );

    let mut files = BTreeMap::new();
    files.insert(INDEX_FILE.to_string(), page);
    files.insert(STYLE_FILE.to_string(), STYLESHEET.to_string());
    files
}

// ── LayoutWireframe tool ───────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct WireframeArgs {
    /// Section objects, each with a 'type' (navbar, hero, footer, grid,
    /// sidebar, form, gallery) and optional fields.
    pub sections: Vec<Value>,
    /// Output directory relative to the working directory (default '.').
    #[serde(default)]
    pub dir: Option<String>,
}

/// Render a wireframe and write `index.html` and `style.css`.
#[derive(Default)]
pub struct LayoutWireframe {
    sandbox: Option<Sandbox>,
}

impl Tool for LayoutWireframe {
    fn name(&self) -> &str {
        LAYOUT_WIREFRAME
    }

    fn description(&self) -> String {
        "Generate index.html and style.css from a list of wireframe sections.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<WireframeArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<WireframeArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = self
                .sandbox
                .as_ref()
                .ok_or_else(|| ToolError::NotInitialized(LAYOUT_WIREFRAME.to_string()))?;

            let wireframe = match Wireframe::from_sections(&args.sections) {
                Ok(w) => w,
                Err(e) => return Ok(ToolOutput::failure(format!("Invalid wireframe: {e}"))),
            };
            let dir = sandbox.resolve(args.dir.as_deref().unwrap_or("."))?;

            let mut targets = Vec::new();
            for (name, contents) in render_wireframe(&wireframe) {
                let path = dir.join(&name);
                let rel = sandbox.relative(&path);
                if sandbox.is_protected(&path) {
                    return Ok(ToolOutput::failure(format!(
                        "Attempt to modify protected file: {rel}"
                    )));
                }
                targets.push((path, rel, contents));
            }

            tokio::fs::create_dir_all(&dir).await?;
            let mut written = Vec::new();
            for (path, rel, contents) in targets {
                tokio::fs::write(&path, contents).await?;
                debug!("Wireframe wrote {rel}");
                written.push(rel);
            }
            Ok(ToolOutput::success(json!({
                "files": written,
                "sections": wireframe.sections.len(),
            })))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagloop::agent::env::SessionConfig;
    use tagloop::tools::ToolRegistry;

    fn example() -> Value {
        json!([
            {"type": "navbar", "links": ["Home", "Contact"]},
            {"type": "hero", "title": "My Website", "subtitle": "Welcome"},
            {"type": "footer", "text": "Copyright 2025"}
        ])
    }

    #[test]
    fn example_renders_all_sections() {
        let wireframe = Wireframe::from_value(&example()).unwrap();
        let files = render_wireframe(&wireframe);
        let html = &files[INDEX_FILE];
        assert!(html.contains(r##"<nav class="navbar"><a href="#">Home</a><a href="#">Contact</a></nav>"##));
        assert!(html.contains(r#"<header class="hero"><h1>My Website</h1><p>Welcome</p></header>"#));
        assert!(html.contains(r#"<footer class="footer"><p>Copyright 2025</p></footer>"#));
        assert!(html.contains(r#"<link rel="stylesheet" href="style.css">"#));
        assert!(files[STYLE_FILE].contains(".navbar {"));
    }

    #[test]
    fn defaults_apply_to_bare_sections() {
        let wireframe = Wireframe::from_value(&json!({"sections": [
            {"type": "navbar"}, {"type": "grid"}, {"type": "form"}, {"type": "gallery", "images": 2}
        ]}))
        .unwrap();
        let html = &render_wireframe(&wireframe)[INDEX_FILE];
        assert!(html.contains(r##"<a href="#">Home</a>"##));
        assert_eq!(html.matches(r#"<div class="card">"#).count(), 3);
        assert!(html.contains("<label>Email</label>"));
        assert_eq!(html.matches(r#"<div class="gallery-item">"#).count(), 2);
    }

    #[test]
    fn unknown_type_is_a_placeholder() {
        let section = Section::from_value(&json!({"type": "PRICING"})).unwrap();
        assert_eq!(section, Section::Other("PRICING".into()));
        let html = render_section(&section);
        assert!(html.contains("<h2>Pricing</h2><p>Placeholder for PRICING</p>"));
    }

    #[test]
    fn text_is_escaped_and_counts_capped() {
        let wireframe = Wireframe::from_value(&json!([
            {"type": "hero", "title": "<script>alert(1)</script>", "backgroundImage": "bg.png"},
            {"type": "grid", "items": 100000}
        ]))
        .unwrap();
        let html = &render_wireframe(&wireframe)[INDEX_FILE];
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("url('bg.png')"));
        assert_eq!(html.matches(r#"class="card""#).count(), MAX_REPEAT as usize);
    }

    #[test]
    fn rejects_non_object_sections() {
        let err = Wireframe::from_value(&json!(["navbar"])).unwrap_err();
        assert!(err.starts_with("section 0:"));
        assert!(Wireframe::from_value(&json!("nope")).is_err());
    }

    #[tokio::test]
    async fn tool_writes_files_through_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let env = AgentEnvironment::new(dir.path(), SessionConfig::default()).unwrap();
        let registry =
            ToolRegistry::from_catalog(&env, vec![Box::new(LayoutWireframe::default())], None)
                .unwrap();

        let mut args = ToolArgs::new();
        args.insert("sections".into(), example());
        args.insert("dir".into(), json!("site"));
        let record = registry.dispatch(LAYOUT_WIREFRAME, args).await;
        assert!(record.succeeded(), "{:?}", record.error);
        assert_eq!(
            record.result.unwrap()["data"]["files"],
            json!(["site/index.html", "site/style.css"])
        );
        let html = std::fs::read_to_string(dir.path().join("site/index.html")).unwrap();
        assert!(html.contains("My Website"));
    }

    #[tokio::test]
    async fn protected_target_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            protected_files: vec!["*.css".into()],
            ..Default::default()
        };
        let env = AgentEnvironment::new(dir.path(), config).unwrap();
        let registry =
            ToolRegistry::from_catalog(&env, vec![Box::new(LayoutWireframe::default())], None)
                .unwrap();

        let mut args = ToolArgs::new();
        args.insert("sections".into(), example());
        let record = registry.dispatch(LAYOUT_WIREFRAME, args).await;
        assert_eq!(
            record.error.as_deref(),
            Some("Attempt to modify protected file: style.css")
        );
        assert!(!dir.path().join("index.html").exists());
    }
}
