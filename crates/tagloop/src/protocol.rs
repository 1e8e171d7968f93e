//! The tool-call wire protocol embedded in model output.
//!
//! A model reply may contain any number of directives of the form
//!
//! ```text
//! <tool_call>{"tool": "fs.write", "arguments": {"path": "a.txt", "content": "hi"}}</tool_call>
//! ```
//!
//! Bodies are matched non-greedily: each opening tag pairs with the next
//! closing tag. An opening tag without a closing tag is not a directive.
//! A reply whose trimmed text is exactly `<terminate>` ends the session.

use crate::tools::core::ToolArgs;
use serde_json::Value;

pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";
pub const TERMINATE_TAG: &str = "<terminate>";

/// A parsed `{"tool": ..., "arguments": {...}}` body.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub tool: String,
    pub arguments: ToolArgs,
}

/// One directive found in a reply, in textual order.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Call(ToolCallRequest),
    /// The tag pair was present but its body was unusable.
    Malformed(String),
}

/// Whether `text` contains a tool-call opening tag.
pub fn contains_tool_call(text: &str) -> bool {
    text.contains(TOOL_CALL_OPEN)
}

/// Whether `text`, trimmed, is exactly the termination tag.
pub fn is_termination(text: &str) -> bool {
    text.trim() == TERMINATE_TAG
}

/// Iterator over raw bodies between tool-call tag pairs.
pub struct TagBodies<'a> {
    rest: &'a str,
}

impl<'a> Iterator for TagBodies<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let (_, after_open) = self.rest.split_once(TOOL_CALL_OPEN)?;
        let Some((body, after_close)) = after_open.split_once(TOOL_CALL_CLOSE) else {
            self.rest = "";
            return None;
        };
        self.rest = after_close;
        Some(body)
    }
}

/// Raw bodies of every closed tool-call tag pair in `text`.
pub fn tag_bodies(text: &str) -> TagBodies<'_> {
    TagBodies { rest: text }
}

/// Scan a reply for every tool-call directive, in order.
pub fn scan_tool_calls(text: &str) -> Vec<Directive> {
    tag_bodies(text)
        .map(|body| match parse_tool_call(body) {
            Ok(call) => Directive::Call(call),
            Err(detail) => Directive::Malformed(detail),
        })
        .collect()
}

/// Parse one directive body. Keys other than `tool` and `arguments` are
/// ignored.
pub fn parse_tool_call(body: &str) -> Result<ToolCallRequest, String> {
    let value: Value = serde_json::from_str(body.trim()).map_err(|e| e.to_string())?;
    let Value::Object(mut object) = value else {
        return Err("expected a JSON object".to_string());
    };
    let tool = match object.remove("tool") {
        Some(Value::String(name)) => name,
        Some(_) => return Err("'tool' must be a string".to_string()),
        None => return Err("missing 'tool' key".to_string()),
    };
    let arguments = match object.remove("arguments") {
        Some(Value::Object(args)) => args,
        Some(_) => return Err("'arguments' must be an object".to_string()),
        None => return Err("missing 'arguments' key".to_string()),
    };
    Ok(ToolCallRequest { tool, arguments })
}

/// Render a directive in wire form.
pub fn format_tool_call(tool: &str, arguments: &ToolArgs) -> String {
    let body = serde_json::json!({ "tool": tool, "arguments": arguments });
    format!("{TOOL_CALL_OPEN}{body}{TOOL_CALL_CLOSE}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(tool: &str) -> String {
        format!(r#"<tool_call>{{"tool": "{tool}", "arguments": {{}}}}</tool_call>"#)
    }

    #[test]
    fn finds_every_directive_in_order() {
        let text = format!("First {} then {} and {}", call("a"), call("b"), call("c"));
        let names: Vec<String> = scan_tool_calls(&text)
            .into_iter()
            .map(|d| match d {
                Directive::Call(c) => c.tool,
                Directive::Malformed(e) => panic!("unexpected malformed: {e}"),
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn bodies_are_non_greedy() {
        let text = "<tool_call>A</tool_call> middle <tool_call>B</tool_call>";
        let bodies: Vec<&str> = tag_bodies(text).collect();
        assert_eq!(bodies, vec!["A", "B"]);
    }

    #[test]
    fn unclosed_tag_is_ignored() {
        let text = format!("{} <tool_call>{{\"tool\": \"x\"", call("ok"));
        assert_eq!(scan_tool_calls(&text).len(), 1);
        assert!(scan_tool_calls("<tool_call>{}").is_empty());
    }

    #[test]
    fn malformed_bodies_do_not_stop_the_scan() {
        let text = format!(
            "<tool_call>not json</tool_call>{}<tool_call>[1,2]</tool_call>",
            call("fs.ls")
        );
        let directives = scan_tool_calls(&text);
        assert_eq!(directives.len(), 3);
        assert!(matches!(directives[0], Directive::Malformed(_)));
        assert!(matches!(&directives[1], Directive::Call(c) if c.tool == "fs.ls"));
        assert_eq!(
            directives[2],
            Directive::Malformed("expected a JSON object".into())
        );
    }

    #[test]
    fn required_keys_and_types() {
        assert_eq!(
            parse_tool_call(r#"{"arguments": {}}"#).unwrap_err(),
            "missing 'tool' key"
        );
        assert_eq!(
            parse_tool_call(r#"{"tool": "x"}"#).unwrap_err(),
            "missing 'arguments' key"
        );
        assert_eq!(
            parse_tool_call(r#"{"tool": 3, "arguments": {}}"#).unwrap_err(),
            "'tool' must be a string"
        );
        assert_eq!(
            parse_tool_call(r#"{"tool": "x", "arguments": []}"#).unwrap_err(),
            "'arguments' must be an object"
        );
        let parsed = parse_tool_call(r#" {"tool": "x", "arguments": {"a": 1}, "note": "extra"} "#)
            .unwrap();
        assert_eq!(parsed.arguments["a"], json!(1));
    }

    #[test]
    fn termination_requires_exact_tag() {
        assert!(is_termination("<terminate>"));
        assert!(is_termination("\n  <terminate>  \n"));
        assert!(!is_termination("Done! <terminate>"));
        assert!(!is_termination(&format!("{} <terminate>", call("a"))));
    }

    #[test]
    fn format_round_trips_through_parser() {
        let args = json!({"path": "index.html"}).as_object().cloned().unwrap();
        let wire = format_tool_call("fs.read", &args);
        assert!(contains_tool_call(&wire));
        let directives = scan_tool_calls(&wire);
        assert_eq!(
            directives,
            vec![Directive::Call(ToolCallRequest {
                tool: "fs.read".into(),
                arguments: args
            })]
        );
    }
}
