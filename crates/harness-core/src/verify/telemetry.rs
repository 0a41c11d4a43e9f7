//! Telemetry event presence checks.
//!
//! A record's event type is read from three places: the bare `type` field,
//! the `event` field, and an OpenTelemetry `name` with its `claude_code.`
//! namespace stripped. Telemetry capture depends on the agent having it
//! enabled, so [`verify_all`] is a soft pass: any one expected category is
//! enough.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::event::EventRecord;
use crate::parser::TELEMETRY_NAMESPACES;
use crate::session::SessionLog;

pub const EXPECTED_EVENT_TYPES: [&str; 3] = ["tool_result", "api_request", "tool_decision"];

fn strip(s: &str) -> &str {
    TELEMETRY_NAMESPACES
        .iter()
        .find_map(|ns| s.strip_prefix(ns))
        .unwrap_or(s)
}

/// Distinct event-type names a record answers to.
fn event_types(rec: &EventRecord) -> BTreeSet<&str> {
    let mut out = BTreeSet::new();
    let Some(obj) = rec.raw.as_object() else {
        return out;
    };
    for key in ["type", "event"] {
        if let Some(t) = obj.get(key).and_then(Value::as_str) {
            out.insert(strip(t));
        }
    }
    if let Some(name) = obj.get("name").and_then(Value::as_str) {
        let stripped = strip(name);
        if stripped.len() != name.len() {
            out.insert(stripped);
        }
    }
    out
}

pub fn has_event_type(log: &SessionLog, event_type: &str) -> bool {
    log.records()
        .iter()
        .any(|r| event_types(r).contains(event_type))
}

pub fn count_event_type(log: &SessionLog, event_type: &str) -> usize {
    log.records()
        .iter()
        .filter(|r| event_types(r).contains(event_type))
        .count()
}

pub fn list_event_types(log: &SessionLog) -> BTreeSet<String> {
    log.records()
        .iter()
        .flat_map(|r| event_types(r).into_iter().map(str::to_owned))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetrySummary {
    pub expected_found: BTreeSet<String>,
    pub expected_missing: BTreeSet<String>,
    pub all_types_seen: BTreeSet<String>,
}

impl TelemetrySummary {
    /// Soft pass: at least one expected category was seen. Zero means
    /// telemetry was most likely never enabled.
    pub fn passed(&self) -> bool {
        !self.expected_found.is_empty()
    }
}

pub fn verify_all(log: &SessionLog) -> TelemetrySummary {
    let all_types_seen = list_event_types(log);
    let (found, missing): (Vec<&str>, Vec<&str>) = EXPECTED_EVENT_TYPES
        .iter()
        .copied()
        .partition(|t| all_types_seen.contains(*t));

    TelemetrySummary {
        expected_found: found.into_iter().map(str::to_owned).collect(),
        expected_missing: missing.into_iter().map(str::to_owned).collect(),
        all_types_seen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn log(lines: &[&str]) -> SessionLog {
        SessionLog::from_text(Path::new("test.jsonl"), &lines.join("\n"))
    }

    #[test]
    fn matches_all_three_representations() {
        let log = log(&[
            r#"{"type":"tool_result","tool_name":"Read"}"#,
            r#"{"event":"api_request","model":"m"}"#,
            r#"{"name":"claude_code.tool_decision","attributes":{"decision":"accept"}}"#,
        ]);
        assert!(has_event_type(&log, "tool_result"));
        assert!(has_event_type(&log, "api_request"));
        assert!(has_event_type(&log, "tool_decision"));
        let summary = verify_all(&log);
        assert!(summary.passed());
        assert!(summary.expected_missing.is_empty());
    }

    #[test]
    fn tool_name_is_not_an_event_type() {
        let log = log(&[r#"{"type":"tool_use","name":"Write"}"#]);
        assert_eq!(
            list_event_types(&log).into_iter().collect::<Vec<_>>(),
            vec!["tool_use".to_string()]
        );
    }

    #[test]
    fn partial_telemetry_is_a_soft_pass() {
        let log = log(&[
            r#"{"name":"claude_code.tool_result"}"#,
            r#"{"name":"claude_code.tool_result"}"#,
        ]);
        let summary = verify_all(&log);
        assert!(summary.passed());
        assert_eq!(summary.expected_found.len(), 1);
        assert_eq!(summary.expected_missing.len(), 2);
        assert_eq!(count_event_type(&log, "tool_result"), 2);
    }

    #[test]
    fn no_expected_events_is_a_hard_fail() {
        let log = log(&[r#"{"type":"assistant","message":{"content":"hi"}}"#, "garbage"]);
        let summary = verify_all(&log);
        assert!(!summary.passed());
        assert_eq!(summary.expected_missing.len(), 3);
        assert!(summary.all_types_seen.contains("assistant"));
    }

    #[test]
    fn record_counted_once_even_if_fields_agree() {
        let log = log(&[r#"{"type":"api_request","event":"claude_code.api_request"}"#]);
        assert_eq!(count_event_type(&log, "api_request"), 1);
    }
}
