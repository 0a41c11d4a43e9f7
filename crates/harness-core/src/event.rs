use serde::Serialize;
use serde_json::{Map, Value};

// ─── EventKind ────────────────────────────────────────────────────────────

/// Normalized record type. Source logs name it `type`, `event` or an
/// OpenTelemetry-style `name: "claude_code.<x>"`; all three collapse here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ToolUse,
    ToolResult,
    Assistant,
    User,
    System,
    /// Anything else, carrying the raw type string (`"unparsed"` for lines
    /// that were not JSON, `"unknown"` for JSON with no recognizable type).
    Other(String),
}

impl EventKind {
    pub fn from_type_str(s: &str) -> Self {
        match s {
            "tool_use" | "tool_call" => EventKind::ToolUse,
            "tool_result" => EventKind::ToolResult,
            "assistant" => EventKind::Assistant,
            "user" => EventKind::User,
            "system" => EventKind::System,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ToolUse => "tool_use",
            EventKind::ToolResult => "tool_result",
            EventKind::Assistant => "assistant",
            EventKind::User => "user",
            EventKind::System => "system",
            EventKind::Other(s) => s,
        }
    }

    /// Conversation messages carry text and nested content blocks rather
    /// than top-level tool fields.
    pub fn is_message(&self) -> bool {
        matches!(
            self,
            EventKind::Assistant | EventKind::User | EventKind::System
        )
    }

    /// Telemetry categories (`api_request`, `tool_decision`, ...) that name
    /// a tool without being a call, whichever field carried them.
    pub fn is_telemetry_category(&self) -> bool {
        crate::verify::telemetry::EXPECTED_EVENT_TYPES.contains(&self.as_str())
    }

    pub fn unparsed() -> Self {
        EventKind::Other("unparsed".into())
    }

    pub fn unknown() -> Self {
        EventKind::Other("unknown".into())
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which field convention produced the record's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordShape {
    /// `type` or `event` field.
    Typed,
    /// `name` (or `type`/`event`) carrying a telemetry namespace prefix.
    Telemetry,
    /// No type field; resolved from `role`, or not at all.
    Untyped,
    /// Line was not valid JSON.
    Unparsed,
}

// ─── Tool payloads ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub content: Value,
    /// Explicit success flag when the record carries one
    /// (`success`, inverted `is_error`, or a `status` string).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// A `tool_use` content block inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Map<String, Value>>,
}

/// A `tool_result` content block inside a user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedResult {
    pub tool_use_id: String,
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

// ─── EventRecord ──────────────────────────────────────────────────────────

/// One line of a session log, normalized.
///
/// Every line yields exactly one record. When nothing can be extracted the
/// optional fields stay empty and `raw` still holds what was read: the decoded
/// JSON value, or the literal text for lines that were not JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// 1-based line number in the session file.
    pub line: usize,
    pub kind: EventKind,
    pub shape: RecordShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<ToolOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested_results: Vec<NestedResult>,
    pub raw: Value,
}

/// A borrowed view of one tool invocation, whether it was a top-level record
/// or a block nested in an assistant message.
#[derive(Debug, Clone, Copy)]
pub struct ToolCallRef<'a> {
    pub name: &'a str,
    pub id: Option<&'a str>,
    pub input: Option<&'a Map<String, Value>>,
    pub record: &'a EventRecord,
}

impl EventRecord {
    /// A record with only `line`, `kind`, `shape` and `raw` populated.
    pub fn bare(line: usize, kind: EventKind, shape: RecordShape, raw: Value) -> Self {
        EventRecord {
            line,
            kind,
            shape,
            tool_name: None,
            tool_use_id: None,
            tool_input: None,
            tool_output: None,
            text_content: None,
            nested_calls: Vec::new(),
            nested_results: Vec::new(),
            raw,
        }
    }

    /// Tool invocations carried by this record.
    ///
    /// Assistant messages yield their nested `tool_use` blocks. Other records
    /// yield their top-level tool name, except results and telemetry records,
    /// which describe a call rather than make one.
    pub fn tool_calls(&self) -> impl Iterator<Item = ToolCallRef<'_>> {
        let top = if self.nested_calls.is_empty() && self.is_invocation_record() {
            self.tool_name.as_deref().map(|name| ToolCallRef {
                name,
                id: self.tool_use_id.as_deref(),
                input: self.tool_input.as_ref(),
                record: self,
            })
        } else {
            None
        };

        top.into_iter()
            .chain(self.nested_calls.iter().map(move |c| ToolCallRef {
                name: &c.name,
                id: c.id.as_deref(),
                input: c.input.as_ref(),
                record: self,
            }))
    }

    fn is_invocation_record(&self) -> bool {
        self.shape != RecordShape::Telemetry
            && !self.kind.is_telemetry_category()
            && !self.kind.is_message()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_from_type_str_maps_aliases() {
        assert_eq!(EventKind::from_type_str("tool_call"), EventKind::ToolUse);
        assert_eq!(EventKind::from_type_str("tool_result"), EventKind::ToolResult);
        assert_eq!(
            EventKind::from_type_str("api_request"),
            EventKind::Other("api_request".into())
        );
        assert_eq!(EventKind::from_type_str("api_request").as_str(), "api_request");
    }

    #[test]
    fn tool_result_records_are_not_calls() {
        let mut rec = EventRecord::bare(1, EventKind::ToolResult, RecordShape::Typed, json!({}));
        rec.tool_name = Some("Write".into());
        assert_eq!(rec.tool_calls().count(), 0);
    }

    #[test]
    fn telemetry_categories_are_not_calls_in_any_shape() {
        for kind in ["tool_decision", "api_request"] {
            for shape in [RecordShape::Typed, RecordShape::Telemetry] {
                let mut rec =
                    EventRecord::bare(1, EventKind::from_type_str(kind), shape, json!({}));
                rec.tool_name = Some("Write".into());
                assert_eq!(rec.tool_calls().count(), 0, "{kind} {shape:?}");
            }
        }
    }

    #[test]
    fn nested_calls_replace_top_level_name() {
        let mut rec = EventRecord::bare(1, EventKind::Assistant, RecordShape::Typed, json!({}));
        rec.tool_name = Some("Read".into());
        rec.nested_calls = vec![
            ToolCall {
                id: Some("tu_1".into()),
                name: "Read".into(),
                input: None,
            },
            ToolCall {
                id: Some("tu_2".into()),
                name: "Bash".into(),
                input: None,
            },
        ];
        let names: Vec<_> = rec.tool_calls().map(|c| c.name).collect();
        assert_eq!(names, vec!["Read", "Bash"]);
    }
}
