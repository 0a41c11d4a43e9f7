//! Tolerant decoding of one session-log line into an [`EventRecord`].
//!
//! The agent's log format has changed across versions, so each field is
//! resolved by an ordered chain of named strategies. The first strategy that
//! recognizes its shape wins; the rest are never consulted. Parsing is total:
//! a line that is not JSON, or JSON of an unknown shape, still produces a
//! record.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::event::{EventKind, EventRecord, NestedResult, RecordShape, ToolCall, ToolOutput};

/// Prefixes that mark an OpenTelemetry event name.
pub const TELEMETRY_NAMESPACES: &[&str] = &["claude_code."];

// ─── Strategy chains ──────────────────────────────────────────────────────

struct Strategy<T> {
    name: &'static str,
    extract: fn(&Value) -> Option<T>,
}

fn first_match<T>(chain: &[Strategy<T>], value: &Value) -> Option<T> {
    chain.iter().find_map(|s| {
        let found = (s.extract)(value);
        if found.is_some() {
            tracing::trace!(strategy = s.name, "field resolved");
        }
        found
    })
}

const KIND_CHAIN: &[Strategy<(EventKind, RecordShape)>] = &[
    Strategy {
        name: "type_field",
        extract: |v| typed_field(v, "type"),
    },
    Strategy {
        name: "event_field",
        extract: |v| typed_field(v, "event"),
    },
    Strategy {
        name: "telemetry_name",
        extract: |v| {
            let name = str_field(v, "name")?;
            let stripped = strip_namespace(name)?;
            Some((EventKind::from_type_str(stripped), RecordShape::Telemetry))
        },
    },
    Strategy {
        name: "message_role",
        extract: |v| {
            let role = str_field(v, "role").or_else(|| {
                v.get("message")
                    .and_then(|m| m.get("role"))
                    .and_then(Value::as_str)
            })?;
            match role {
                "assistant" | "user" | "system" => {
                    Some((EventKind::from_type_str(role), RecordShape::Untyped))
                }
                _ => None,
            }
        },
    },
];

const TOOL_NAME_CHAIN: &[Strategy<String>] = &[
    Strategy {
        name: "name_field",
        extract: |v| {
            str_field(v, "name")
                .filter(|n| strip_namespace(n).is_none())
                .map(str::to_owned)
        },
    },
    Strategy {
        name: "tool_name_field",
        extract: |v| str_field(v, "tool_name").map(str::to_owned),
    },
    Strategy {
        name: "tool_field",
        extract: |v| match v.get("tool")? {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        },
    },
    Strategy {
        name: "telemetry_attributes",
        extract: |v| {
            let attrs = v.get("attributes")?;
            str_field(attrs, "tool_name")
                .or_else(|| str_field(attrs, "tool"))
                .map(str::to_owned)
        },
    },
];

const TOOL_INPUT_CHAIN: &[Strategy<Map<String, Value>>] = &[
    Strategy {
        name: "input_field",
        extract: |v| object_field(v, "input"),
    },
    Strategy {
        name: "tool_input_field",
        extract: |v| object_field(v, "tool_input"),
    },
    Strategy {
        name: "arguments_field",
        extract: |v| object_field(v, "arguments"),
    },
    Strategy {
        name: "parameters_field",
        extract: |v| object_field(v, "parameters").or_else(|| object_field(v, "params")),
    },
];

const TOOL_OUTPUT_CHAIN: &[Strategy<Value>] = &[
    Strategy {
        name: "output_field",
        extract: |v| non_null_field(v, "output").or_else(|| non_null_field(v, "tool_output")),
    },
    Strategy {
        name: "result_field",
        extract: |v| non_null_field(v, "result"),
    },
    Strategy {
        name: "content_field",
        extract: |v| non_null_field(v, "content"),
    },
    Strategy {
        name: "response_field",
        extract: |v| non_null_field(v, "response"),
    },
];

const TOOL_USE_ID_CHAIN: &[Strategy<String>] = &[
    Strategy {
        name: "tool_use_id_field",
        extract: |v| str_field(v, "tool_use_id").map(str::to_owned),
    },
    Strategy {
        name: "call_id_field",
        extract: |v| str_field(v, "call_id").map(str::to_owned),
    },
    Strategy {
        name: "id_field",
        extract: |v| str_field(v, "id").map(str::to_owned),
    },
];

// ─── Entry point ──────────────────────────────────────────────────────────

/// Parse one line of a session log. Never fails.
pub fn parse_line(line_no: usize, text: &str) -> EventRecord {
    let value = match serde_json::from_str::<Value>(text.trim()) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(line = line_no, error = %e, "line is not JSON; keeping as unparsed");
            let mut rec = EventRecord::bare(
                line_no,
                EventKind::unparsed(),
                RecordShape::Unparsed,
                Value::String(text.to_string()),
            );
            rec.tool_name = textual_tool_name(text);
            return rec;
        }
    };

    parse_value(line_no, value)
}

/// Normalize an already-decoded JSON value.
pub fn parse_value(line_no: usize, value: Value) -> EventRecord {
    let (kind, shape) = if value.is_object() {
        first_match(KIND_CHAIN, &value).unwrap_or((EventKind::unknown(), RecordShape::Untyped))
    } else {
        (EventKind::unknown(), RecordShape::Untyped)
    };

    let mut rec = EventRecord::bare(line_no, kind, shape, Value::Null);

    match rec.kind {
        EventKind::Assistant => {
            rec.nested_calls = nested_tool_calls(&value);
            rec.tool_name = rec.nested_calls.first().map(|c| c.name.clone());
            rec.text_content = message_text(&value);
        }
        EventKind::User => {
            rec.nested_results = nested_tool_results(&value);
            rec.text_content = message_text(&value);
        }
        EventKind::System => {
            rec.text_content = message_text(&value);
        }
        _ if value.is_object() => {
            rec.tool_name = first_match(TOOL_NAME_CHAIN, &value).or_else(|| {
                // Older agent versions buried the tool name in shapes we do not
                // model; fall back to a textual scan of the line.
                textual_tool_name(&value.to_string())
            });
            rec.tool_use_id = first_match(TOOL_USE_ID_CHAIN, &value);
            rec.tool_input = first_match(TOOL_INPUT_CHAIN, &value);
            rec.tool_output = first_match(TOOL_OUTPUT_CHAIN, &value).map(|content| ToolOutput {
                content,
                success: success_flag(&value),
            });
        }
        _ => {}
    }

    rec.raw = value;
    rec
}

// ─── Field helpers ────────────────────────────────────────────────────────

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn non_null_field(v: &Value, key: &str) -> Option<Value> {
    v.get(key).filter(|x| !x.is_null()).cloned()
}

/// An object field, or a string field holding a JSON-encoded object.
fn object_field(v: &Value, key: &str) -> Option<Map<String, Value>> {
    match v.get(key)? {
        Value::Object(o) => Some(o.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(o)) => Some(o),
            _ => None,
        },
        _ => None,
    }
}

fn strip_namespace(name: &str) -> Option<&str> {
    TELEMETRY_NAMESPACES
        .iter()
        .find_map(|ns| name.strip_prefix(ns))
}

fn typed_field(v: &Value, key: &str) -> Option<(EventKind, RecordShape)> {
    let t = str_field(v, key)?;
    // `{"type":"message","role":...}` is the raw API shape; let the role decide.
    if t == "message" {
        return None;
    }
    match strip_namespace(t) {
        Some(stripped) => Some((EventKind::from_type_str(stripped), RecordShape::Telemetry)),
        None => Some((EventKind::from_type_str(t), RecordShape::Typed)),
    }
}

fn success_flag(v: &Value) -> Option<bool> {
    if let Some(b) = v.get("success").and_then(Value::as_bool) {
        return Some(b);
    }
    if let Some(b) = v.get("is_error").and_then(Value::as_bool) {
        return Some(!b);
    }
    match str_field(v, "status")? {
        "success" | "ok" | "completed" => Some(true),
        "failed" | "failure" | "error" => Some(false),
        _ => None,
    }
}

/// The content array of a message: `message.content` (stream-json) or a
/// top-level `content` (older transcripts).
fn content_blocks(v: &Value) -> Option<&Vec<Value>> {
    v.get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .or_else(|| v.get("content").and_then(Value::as_array))
}

fn nested_tool_calls(v: &Value) -> Vec<ToolCall> {
    let Some(blocks) = content_blocks(v) else {
        return Vec::new();
    };
    blocks
        .iter()
        .filter(|b| matches!(str_field(b, "type"), Some("tool_use" | "tool_call")))
        .filter_map(|b| {
            let name = str_field(b, "name")?.to_owned();
            Some(ToolCall {
                id: str_field(b, "id").map(str::to_owned),
                name,
                input: object_field(b, "input").or_else(|| object_field(b, "arguments")),
            })
        })
        .collect()
}

fn nested_tool_results(v: &Value) -> Vec<NestedResult> {
    let Some(blocks) = content_blocks(v) else {
        return Vec::new();
    };
    blocks
        .iter()
        .filter(|b| str_field(b, "type") == Some("tool_result"))
        .filter_map(|b| {
            Some(NestedResult {
                tool_use_id: str_field(b, "tool_use_id")?.to_owned(),
                content: b.get("content").cloned().unwrap_or(Value::Null),
                is_error: b.get("is_error").and_then(Value::as_bool),
            })
        })
        .collect()
}

fn message_text(v: &Value) -> Option<String> {
    let content = v
        .get("message")
        .and_then(|m| m.get("content"))
        .or_else(|| v.get("content"));

    let text = match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter(|b| str_field(b, "type") == Some("text"))
            .filter_map(|b| str_field(b, "text"))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => str_field(v, "text").unwrap_or_default().to_owned(),
    };

    (!text.is_empty()).then_some(text)
}

static TOOL_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn tool_name_re() -> &'static Regex {
    TOOL_NAME_RE
        .get_or_init(|| Regex::new(r#""(?:name|tool|tool_name)"\s*:\s*"([^"]+)""#).unwrap())
}

/// Pull `"name":"X"`, `"tool":"X"` or `"tool_name":"X"` out of raw text,
/// skipping telemetry event names.
fn textual_tool_name(text: &str) -> Option<String> {
    tool_name_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|name| strip_namespace(name).is_none())
        .map(str::to_owned)
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_json_becomes_unparsed_record() {
        let rec = parse_line(3, "Error: connection reset");
        assert_eq!(rec.line, 3);
        assert_eq!(rec.kind, EventKind::unparsed());
        assert_eq!(rec.shape, RecordShape::Unparsed);
        assert_eq!(rec.raw, Value::String("Error: connection reset".into()));
        assert!(rec.tool_name.is_none());
    }

    #[test]
    fn empty_line_still_yields_a_record() {
        let rec = parse_line(1, "");
        assert_eq!(rec.kind, EventKind::unparsed());
        assert_eq!(rec.raw, Value::String(String::new()));
    }

    #[test]
    fn truncated_line_recovers_tool_name_textually() {
        let rec = parse_line(7, r#"{"type":"tool_use","name":"Bash","input":{"command":"ls"#);
        assert_eq!(rec.kind, EventKind::unparsed());
        assert_eq!(rec.tool_name.as_deref(), Some("Bash"));
    }

    #[test]
    fn typed_tool_use_line() {
        let rec = parse_line(
            1,
            r#"{"type":"tool_use","name":"Write","input":{"file_path":"app.py"}}"#,
        );
        assert_eq!(rec.kind, EventKind::ToolUse);
        assert_eq!(rec.shape, RecordShape::Typed);
        assert_eq!(rec.tool_name.as_deref(), Some("Write"));
        let input = rec.tool_input.unwrap();
        assert_eq!(input["file_path"], "app.py");
    }

    #[test]
    fn event_field_and_tool_name_field() {
        let rec = parse_line(1, r#"{"event":"tool_call","tool_name":"Edit","tool_input":{"path":"a.rs"}}"#);
        assert_eq!(rec.kind, EventKind::ToolUse);
        assert_eq!(rec.tool_name.as_deref(), Some("Edit"));
        assert_eq!(rec.tool_input.unwrap()["path"], "a.rs");
    }

    #[test]
    fn telemetry_name_is_stripped_and_not_a_tool_name() {
        let rec = parse_line(
            1,
            r#"{"name":"claude_code.tool_result","attributes":{"tool_name":"Read","success":"true"}}"#,
        );
        assert_eq!(rec.kind, EventKind::ToolResult);
        assert_eq!(rec.shape, RecordShape::Telemetry);
        assert_eq!(rec.tool_name.as_deref(), Some("Read"));

        let rec = parse_line(1, r#"{"name":"claude_code.api_request","attributes":{"model":"m"}}"#);
        assert_eq!(rec.kind, EventKind::Other("api_request".into()));
        assert!(rec.tool_name.is_none());
    }

    #[test]
    fn assistant_message_with_nested_tool_use() {
        let rec = parse_line(
            2,
            r#"{"type":"assistant","session_id":"s1","message":{"role":"assistant","content":[
                {"type":"text","text":"Let me write that."},
                {"type":"tool_use","id":"tu_1","name":"Write","input":{"file_path":"/tmp/app.py"}},
                {"type":"tool_use","id":"tu_2","name":"Bash","input":{"command":"ls"}}
            ]}}"#
                .replace('\n', " ")
                .as_str(),
        );
        assert_eq!(rec.kind, EventKind::Assistant);
        assert_eq!(rec.tool_name.as_deref(), Some("Write"));
        assert_eq!(rec.nested_calls.len(), 2);
        assert_eq!(rec.nested_calls[1].id.as_deref(), Some("tu_2"));
        assert_eq!(rec.text_content.as_deref(), Some("Let me write that."));
    }

    #[test]
    fn role_only_message_is_resolved() {
        let rec = parse_line(1, r#"{"type":"message","role":"user","content":"hello"}"#);
        assert_eq!(rec.kind, EventKind::User);
        assert_eq!(rec.shape, RecordShape::Untyped);
        assert_eq!(rec.text_content.as_deref(), Some("hello"));
    }

    #[test]
    fn user_message_collects_nested_results() {
        let rec = parse_line(
            1,
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"tu_1","content":"ok","is_error":false}]}}"#,
        );
        assert_eq!(rec.nested_results.len(), 1);
        assert_eq!(rec.nested_results[0].tool_use_id, "tu_1");
        assert_eq!(rec.nested_results[0].is_error, Some(false));
    }

    #[test]
    fn system_init_does_not_pick_up_server_names() {
        let rec = parse_line(
            1,
            r#"{"type":"system","subtype":"init","mcp_servers":[{"name":"docs","status":"connected"}]}"#,
        );
        assert_eq!(rec.kind, EventKind::System);
        assert!(rec.tool_name.is_none());
    }

    #[test]
    fn string_encoded_arguments_are_decoded() {
        let rec = parse_line(
            1,
            r#"{"type":"tool_call","name":"Skill","arguments":"{\"skill\":\"pytest\"}"}"#,
        );
        assert_eq!(rec.tool_input.unwrap()["skill"], "pytest");
    }

    #[test]
    fn tool_result_output_and_success_flag() {
        let rec = parse_line(
            1,
            r#"{"type":"tool_result","tool_name":"Bash","tool_use_id":"tu_9","output":"done","status":"failed"}"#,
        );
        assert_eq!(rec.kind, EventKind::ToolResult);
        assert_eq!(rec.tool_use_id.as_deref(), Some("tu_9"));
        let out = rec.tool_output.unwrap();
        assert_eq!(out.content, Value::String("done".into()));
        assert_eq!(out.success, Some(false));
    }

    #[test]
    fn unknown_json_shape_keeps_fields_empty() {
        let rec = parse_line(1, r#"[1, 2, 3]"#);
        assert_eq!(rec.kind, EventKind::unknown());
        assert!(rec.tool_name.is_none());
        assert!(rec.tool_input.is_none());
        assert_eq!(rec.raw, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn nested_textual_fallback_for_untyped_object() {
        let rec = parse_line(1, r#"{"data":{"payload":{"tool":"Grep"}}}"#);
        assert_eq!(rec.kind, EventKind::unknown());
        assert_eq!(rec.tool_name.as_deref(), Some("Grep"));
    }
}
