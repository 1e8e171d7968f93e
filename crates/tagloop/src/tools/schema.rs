//! Argument schemas for tools.
//!
//! A [`ToolSchema`] is an ordered list of [`ToolArgument`]s. Schemas are
//! usually derived from a typed argument struct via `schemars`
//! ([`ToolSchema::for_args`]) and validated with `jsonschema` before a tool
//! runs, so a tool's `execute` only ever sees arguments with the declared
//! presence and kinds.

use crate::tools::core::ToolArgs;
use schemars::JsonSchema;
use serde_json::{Map, Value, json};
use std::fmt;

/// Expected JSON kind of a tool argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Int,
    Bool,
    List,
    Mapping,
    /// No kind constraint.
    Any,
}

impl ArgKind {
    /// JSON Schema `type` keyword for this kind.
    pub fn json_type(self) -> Option<&'static str> {
        match self {
            ArgKind::String => Some("string"),
            ArgKind::Int => Some("integer"),
            ArgKind::Bool => Some("boolean"),
            ArgKind::List => Some("array"),
            ArgKind::Mapping => Some("object"),
            ArgKind::Any => None,
        }
    }

    fn from_json_type(ty: &str) -> Self {
        match ty {
            "string" => ArgKind::String,
            "integer" => ArgKind::Int,
            "boolean" => ArgKind::Bool,
            "array" => ArgKind::List,
            "object" => ArgKind::Mapping,
            _ => ArgKind::Any,
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArgKind::String => "str",
            ArgKind::Int => "int",
            ArgKind::Bool => "bool",
            ArgKind::List => "list",
            ArgKind::Mapping => "dict",
            ArgKind::Any => "any",
        };
        f.write_str(label)
    }
}

/// A single named argument accepted by a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub kind: ArgKind,
}

impl ToolArgument {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
        kind: ArgKind,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
            kind,
        }
    }
}

/// Ordered set of arguments a tool accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSchema {
    arguments: Vec<ToolArgument>,
}

impl ToolSchema {
    /// An empty schema (the tool takes no arguments).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from a typed argument struct.
    ///
    /// Required-ness comes from the struct's `required` list (fields with
    /// `#[serde(default)]` or `Option<_>` are optional), descriptions from
    /// field doc comments.
    pub fn for_args<T: JsonSchema>() -> Self {
        Self::from_json_schema(&crate::json_schema_for::<T>())
    }

    /// Build a schema from an object JSON Schema (`properties` + `required`).
    ///
    /// Nullable unions such as `["string", "null"]` map to the non-null kind.
    pub fn from_json_schema(schema: &Value) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let arguments = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| ToolArgument {
                        name: name.clone(),
                        description: prop
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        required: required.contains(&name.as_str()),
                        kind: kind_of(prop),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { arguments }
    }

    /// Append an argument (builder pattern). Replaces an existing argument
    /// with the same name.
    pub fn with_argument(mut self, argument: ToolArgument) -> Self {
        self.register_argument(argument);
        self
    }

    /// Append an argument. Replaces an existing argument with the same name.
    pub fn register_argument(&mut self, argument: ToolArgument) {
        match self.arguments.iter_mut().find(|a| a.name == argument.name) {
            Some(existing) => *existing = argument,
            None => self.arguments.push(argument),
        }
    }

    /// Arguments in declaration order.
    pub fn arguments(&self) -> &[ToolArgument] {
        &self.arguments
    }

    /// Look up an argument by name.
    pub fn argument(&self, name: &str) -> Option<&ToolArgument> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// Render as an object JSON Schema. Optional arguments also accept
    /// `null`, which reads as absent.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for arg in &self.arguments {
            let mut prop = Map::new();
            match arg.kind.json_type() {
                Some(ty) if arg.required => {
                    prop.insert("type".into(), json!(ty));
                }
                Some(ty) => {
                    prop.insert("type".into(), json!([ty, "null"]));
                }
                None => {}
            }
            if !arg.description.is_empty() {
                prop.insert("description".into(), json!(arg.description));
            }
            properties.insert(arg.name.clone(), Value::Object(prop));
        }
        let required: Vec<&str> = self
            .arguments
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Compact argument list for prompts, e.g. `path:str, recursive?:bool`.
    pub fn signature(&self) -> String {
        self.arguments
            .iter()
            .map(|a| {
                let opt = if a.required { "" } else { "?" };
                format!("{}{opt}:{}", a.name, a.kind)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check that every required argument is present and every present
    /// declared argument has the declared kind. Undeclared extra arguments
    /// are accepted.
    pub fn validate(&self, args: &ToolArgs) -> Result<(), String> {
        let schema = self.to_json_schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| format!("invalid tool schema: {e}"))?;

        let instance = Value::Object(args.clone());
        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

fn kind_of(prop: &Value) -> ArgKind {
    match prop.get("type") {
        Some(Value::String(ty)) => ArgKind::from_json_type(ty),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map_or(ArgKind::Any, ArgKind::from_json_type),
        _ => ArgKind::Any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct SampleArgs {
        /// Target path.
        path: String,
        /// Remove contents too.
        #[serde(default)]
        recursive: Option<bool>,
        /// Depth limit.
        #[serde(default)]
        depth: Option<i64>,
        /// Labels.
        #[serde(default)]
        labels: Option<Vec<String>>,
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn for_args_reads_kinds_and_required() {
        let schema = ToolSchema::for_args::<SampleArgs>();
        let path = schema.argument("path").unwrap();
        assert!(path.required);
        assert_eq!(path.kind, ArgKind::String);
        assert_eq!(path.description, "Target path.");

        let recursive = schema.argument("recursive").unwrap();
        assert!(!recursive.required);
        assert_eq!(recursive.kind, ArgKind::Bool);
        assert_eq!(schema.argument("depth").unwrap().kind, ArgKind::Int);
        assert_eq!(schema.argument("labels").unwrap().kind, ArgKind::List);
    }

    #[test]
    fn missing_required_fails() {
        let schema = ToolSchema::for_args::<SampleArgs>();
        let err = schema.validate(&args(json!({}))).unwrap_err();
        assert!(err.contains("path"), "got: {err}");
    }

    #[test]
    fn kind_mismatch_fails() {
        let schema = ToolSchema::for_args::<SampleArgs>();
        assert!(schema.validate(&args(json!({"path": 42}))).is_err());
        assert!(
            schema
                .validate(&args(json!({"path": "a", "recursive": "yes"})))
                .is_err()
        );
    }

    #[test]
    fn valid_arguments_pass() {
        let schema = ToolSchema::for_args::<SampleArgs>();
        schema
            .validate(&args(json!({"path": "a", "recursive": true, "depth": 2})))
            .unwrap();
        // Extra keys are not rejected.
        schema
            .validate(&args(json!({"path": "a", "extra": 1})))
            .unwrap();
    }

    #[test]
    fn null_is_accepted_only_for_optional_arguments() {
        let schema = ToolSchema::for_args::<SampleArgs>();
        schema
            .validate(&args(json!({"path": "a", "recursive": null, "labels": null})))
            .unwrap();
        assert!(schema.validate(&args(json!({"path": null}))).is_err());
        assert_eq!(
            schema.to_json_schema()["properties"]["depth"]["type"],
            json!(["integer", "null"])
        );
    }

    #[test]
    fn manual_schema_and_signature() {
        let schema = ToolSchema::new()
            .with_argument(ToolArgument::new("name", "Name", true, ArgKind::String))
            .with_argument(ToolArgument::new("tags", "Tags", false, ArgKind::List));
        assert_eq!(schema.signature(), "name:str, tags?:list");
        assert_eq!(schema.to_json_schema()["required"], json!(["name"]));
    }

    #[test]
    fn register_argument_replaces_same_name() {
        let mut schema = ToolSchema::new();
        schema.register_argument(ToolArgument::new("a", "", true, ArgKind::String));
        schema.register_argument(ToolArgument::new("a", "", false, ArgKind::Int));
        assert_eq!(schema.arguments().len(), 1);
        assert_eq!(schema.arguments()[0].kind, ArgKind::Int);
    }
}
