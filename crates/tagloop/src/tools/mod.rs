//! Tool abstractions for tag-protocol agents.
//!
//! Every capability the model can invoke is a [`Tool`] implementor. Tools
//! are collected into a [`ToolRegistry`], which filters the catalog by the
//! session's allow-list, validates arguments against each [`ToolSchema`]
//! and folds every outcome into a [`ToolCallRecord`].
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolRegistry`], [`ToolOutput`],
//!   [`ToolCallRecord`], [`ToolError`].
//! - [`schema`]: [`ToolSchema`] and [`ToolArgument`] with JSON Schema
//!   validation.
//! - [`sandbox`]: path containment and glob-based write protection.
//! - [`fs`]: the built-in `fs.*` tools. Register all of them with
//!   [`filesystem_tools()`](fs::filesystem_tools).
//! - [`names`]: canonical tool-name constants.

pub mod core;
pub mod fs;
pub mod names;
pub mod sandbox;
pub mod schema;

pub use self::core::{
    INVALID_TOOL_NAME, Tool, ToolArgs, ToolCallRecord, ToolError, ToolFuture, ToolOutput,
    ToolRegistry, log_tool_call, parse_tool_args,
};
pub use fs::filesystem_tools;
pub use sandbox::{PathPolicy, Sandbox};
pub use schema::{ArgKind, ToolArgument, ToolSchema};
