//! Queries over tool usage in a [`SessionLog`].
//!
//! All queries see both top-level tool records and `tool_use` blocks nested
//! in assistant messages. Unknown tool names give empty/false/zero answers.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::event::{EventKind, EventRecord, ToolCallRef};
use crate::session::SessionLog;

pub const WRITE_TOOL: &str = "Write";

/// Input keys that may hold the target path of a `Write` call.
const PATH_KEYS: &[&str] = &["file_path", "path"];

pub fn was_tool_invoked(log: &SessionLog, tool_name: &str) -> bool {
    calls(log).any(|c| c.name == tool_name)
}

pub fn count_tool_calls(log: &SessionLog, tool_name: &str) -> usize {
    calls(log).filter(|c| c.name == tool_name).count()
}

pub fn list_all_tools(log: &SessionLog) -> BTreeSet<String> {
    calls(log).map(|c| c.name.to_string()).collect()
}

/// Paths passed to `Write`, in log order.
pub fn written_paths(log: &SessionLog) -> Vec<&str> {
    calls(log)
        .filter(|c| c.name == WRITE_TOOL)
        .filter_map(|c| write_target(c.input?))
        .collect()
}

/// True if a `Write` call targeted `path`.
///
/// Matching is deliberately loose: exact, suffix in either direction (logged
/// paths may be absolute while callers pass relative ones, or the reverse),
/// then substring. Short fragments can over-match (`a.py` hits `data.py`).
pub fn was_file_created(log: &SessionLog, path: &str) -> bool {
    written_paths(log)
        .into_iter()
        .any(|candidate| path_matches(candidate, path))
}

fn path_matches(candidate: &str, query: &str) -> bool {
    if candidate.is_empty() || query.is_empty() {
        return false;
    }
    candidate == query
        || candidate.ends_with(query)
        || query.ends_with(candidate)
        || candidate.contains(query)
}

fn write_target(input: &Map<String, Value>) -> Option<&str> {
    PATH_KEYS
        .iter()
        .find_map(|k| input.get(*k).and_then(Value::as_str))
}

// ─── Results ──────────────────────────────────────────────────────────────

/// One invocation paired with what came back.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult<'a> {
    /// Line of the invocation.
    pub line: usize,
    pub input: Option<&'a Map<String, Value>>,
    pub output: Option<&'a Value>,
    pub success: bool,
}

/// Lazily pair every invocation of `tool_name` with its result.
///
/// Output is taken from the invoking record itself when present, then from a
/// later result carrying the call's id, then from the next result naming the
/// same tool before that tool is invoked again. Each call to this function
/// starts a fresh pass.
pub fn extract_tool_results<'a>(
    log: &'a SessionLog,
    tool_name: &'a str,
) -> impl Iterator<Item = ToolResult<'a>> + 'a {
    let records = log.records();
    records.iter().enumerate().flat_map(move |(idx, rec)| {
        rec.tool_calls()
            .filter(move |c| c.name == tool_name)
            .map(move |call| pair_result(records, idx, call))
    })
}

fn pair_result<'a>(records: &'a [EventRecord], idx: usize, call: ToolCallRef<'a>) -> ToolResult<'a> {
    let (output, flag) = inline_output(call)
        .or_else(|| call.id.and_then(|id| output_by_id(&records[idx + 1..], id)))
        .or_else(|| output_by_name(&records[idx + 1..], call.name))
        .map(|(o, f)| (Some(o), f))
        .unwrap_or((None, None));

    ToolResult {
        line: call.record.line,
        input: call.input,
        output,
        success: flag.unwrap_or(true),
    }
}

type Output<'a> = (&'a Value, Option<bool>);

fn inline_output(call: ToolCallRef<'_>) -> Option<Output<'_>> {
    if !call.record.nested_calls.is_empty() {
        return None;
    }
    call.record
        .tool_output
        .as_ref()
        .map(|o| (&o.content, o.success))
}

fn output_by_id<'a>(later: &'a [EventRecord], id: &str) -> Option<Output<'a>> {
    later.iter().find_map(|rec| {
        if let Some(nested) = rec.nested_results.iter().find(|r| r.tool_use_id == id) {
            return Some((&nested.content, nested.is_error.map(|e| !e)));
        }
        if rec.kind == EventKind::ToolResult && rec.tool_use_id.as_deref() == Some(id) {
            return rec.tool_output.as_ref().map(|o| (&o.content, o.success));
        }
        None
    })
}

fn output_by_name<'a>(later: &'a [EventRecord], name: &str) -> Option<Output<'a>> {
    for rec in later {
        if rec.kind == EventKind::ToolResult && rec.tool_name.as_deref() == Some(name) {
            return rec.tool_output.as_ref().map(|o| (&o.content, o.success));
        }
        if rec.tool_calls().any(|c| c.name == name) {
            return None;
        }
    }
    None
}

// ─── Session outcome ──────────────────────────────────────────────────────

/// Conservative success heuristic: a session succeeded unless some record
/// carries an error indicator.
pub fn is_session_successful(log: &SessionLog) -> bool {
    first_error(log).is_none()
}

/// The first record carrying an error indicator: a non-null `error`,
/// `status == "failed"`, `success == false` or `is_error == true`.
pub fn first_error(log: &SessionLog) -> Option<&EventRecord> {
    log.records().iter().find(|r| has_error_indicator(r))
}

fn has_error_indicator(rec: &EventRecord) -> bool {
    let Some(obj) = rec.raw.as_object() else {
        return false;
    };
    obj.get("error").is_some_and(|e| !e.is_null())
        || obj.get("status").and_then(Value::as_str) == Some("failed")
        || obj.get("success").and_then(Value::as_bool) == Some(false)
        || obj.get("is_error").and_then(Value::as_bool) == Some(true)
}

fn calls(log: &SessionLog) -> impl Iterator<Item = ToolCallRef<'_>> {
    log.records().iter().flat_map(EventRecord::tool_calls)
}

// ─── Tests ────────────────────────────────────────────────────────────────
