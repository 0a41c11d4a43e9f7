//! A/B comparison reports and verification verdicts, rendered as JSON and as
//! a short human summary.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io;
use crate::paths;
use crate::session::SessionLog;
use crate::status::SessionStatus;
use crate::verify::{skill, tool};

// ---------------------------------------------------------------------------
// ExecutionMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Both variants start together; wall-clock is roughly max(A, B).
    #[default]
    Parallel,
    /// B starts after A exits.
    Sequential,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Sequential => "sequential",
        }
    }
}

// ---------------------------------------------------------------------------
// ComparisonReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub session_id: String,
    pub session_file: PathBuf,
    /// `None` when the report was rebuilt from files alone.
    pub exit_code: Option<i32>,
    pub status: Option<SessionStatus>,
    pub success: bool,
    pub tools_used: BTreeSet<String>,
    pub skills_used: BTreeSet<String>,
    pub output_line_count: usize,
    pub output_byte_count: u64,
    /// Why the session log could not be analyzed (missing, empty, unreadable).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub both_successful: bool,
    pub tools_match: bool,
    pub skills_match: bool,
    /// `bytes_b / (bytes_a + 1)`. Informational only.
    pub size_ratio: f64,
}

impl Comparison {
    pub fn between(a: &VariantSummary, b: &VariantSummary) -> Self {
        Comparison {
            both_successful: a.success && b.success,
            tools_match: a.tools_used == b.tools_used,
            skills_match: a.skills_used == b.skills_used,
            size_ratio: b.output_byte_count as f64 / (a.output_byte_count as f64 + 1.0),
        }
    }
}

/// Result of one A/B run. Built once, then only serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub test_name: String,
    pub prefix: String,
    pub timestamp: DateTime<Utc>,
    pub mode: ExecutionMode,
    pub variant_a: VariantSummary,
    pub variant_b: VariantSummary,
    pub comparison: Comparison,
}

impl ComparisonReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write `<report_dir>/<prefix>_comparison.json` and return its path.
    pub fn write(&self, report_dir: &Path) -> Result<PathBuf> {
        let path = paths::comparison_report_file(report_dir, &self.prefix);
        io::atomic_write(&path, self.to_json()?.as_bytes())?;
        tracing::info!(path = %path.display(), "comparison report written");
        Ok(path)
    }

    fn row(&self, label: &str, f: impl Fn(&VariantSummary) -> String) -> Vec<String> {
        vec![label.to_string(), f(&self.variant_a), f(&self.variant_b)]
    }

    pub fn summary(&self) -> String {
        let rows = vec![
            self.row("session", |v| v.session_id.clone()),
            self.row("exit code", |v| {
                v.exit_code.map_or_else(|| "-".to_string(), |c| c.to_string())
            }),
            self.row("status", |v| {
                v.status.map_or_else(|| "-".to_string(), |s| s.label())
            }),
            self.row("success", |v| yes_no(v.success).to_string()),
            self.row("tools", |v| join_or_dash(&v.tools_used)),
            self.row("skills", |v| join_or_dash(&v.skills_used)),
            self.row("lines", |v| v.output_line_count.to_string()),
            self.row("bytes", |v| v.output_byte_count.to_string()),
        ];

        let mut out = format!(
            "A/B comparison: {} ({}, {})\n\n",
            self.test_name,
            self.prefix,
            self.mode.as_str()
        );
        out.push_str(&render_table(&["", "A", "B"], &rows));
        for (label, v) in [("A", &self.variant_a), ("B", &self.variant_b)] {
            if let Some(err) = &v.load_error {
                out.push_str(&format!("\nvariant {label}: {err}"));
            }
        }
        out.push_str(&format!(
            "\nboth successful: {}  tools match: {}  skills match: {}  size ratio (B/A): {:.2}\n",
            yes_no(self.comparison.both_successful),
            yes_no(self.comparison.tools_match),
            yes_no(self.comparison.skills_match),
            self.comparison.size_ratio
        ));
        out
    }
}

// ---------------------------------------------------------------------------
// ReportBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`ComparisonReport`] from two session files.
///
/// Everything except the timestamp is derived from the files and the
/// supplied statuses, so the same inputs always produce the same report.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    test_name: String,
    prefix: String,
    mode: ExecutionMode,
}

impl ReportBuilder {
    pub fn new(test_name: impl Into<String>, prefix: impl Into<String>) -> Self {
        ReportBuilder {
            test_name: test_name.into(),
            prefix: prefix.into(),
            mode: ExecutionMode::default(),
        }
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Analyze one variant's session file. Never fails: a log that cannot be
    /// loaded yields an unsuccessful summary with `load_error` set.
    pub fn summarize_variant(
        session_id: &str,
        session_file: &Path,
        status: Option<SessionStatus>,
    ) -> VariantSummary {
        let (output_line_count, output_byte_count) = io::file_metrics(session_file)
            .unwrap_or_else(|e| {
                tracing::warn!(path = %session_file.display(), error = %e, "could not measure session file");
                (0, 0)
            });

        let mut summary = VariantSummary {
            session_id: session_id.to_string(),
            session_file: session_file.to_path_buf(),
            exit_code: status.map(|s| s.exit_code()),
            status,
            success: false,
            tools_used: BTreeSet::new(),
            skills_used: BTreeSet::new(),
            output_line_count,
            output_byte_count,
            load_error: None,
        };

        match SessionLog::load(session_file) {
            Ok(log) => {
                summary.success = tool::is_session_successful(&log);
                summary.tools_used = tool::list_all_tools(&log);
                summary.skills_used = skill::list_skills_invoked(&log);
            }
            Err(e) => {
                tracing::warn!(session = session_id, error = %e, "session log not analyzable");
                summary.load_error = Some(e.to_string());
            }
        }
        summary
    }

    pub fn build(
        self,
        variant_a: VariantSummary,
        variant_b: VariantSummary,
        timestamp: DateTime<Utc>,
    ) -> ComparisonReport {
        let comparison = Comparison::between(&variant_a, &variant_b);
        ComparisonReport {
            test_name: self.test_name,
            prefix: self.prefix,
            timestamp,
            mode: self.mode,
            variant_a,
            variant_b,
            comparison,
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of one verifier assertion or query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub check: String,
    pub session_file: PathBuf,
    pub passed: bool,
    /// One line: what was expected and what was found.
    pub reason: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}

impl Verdict {
    pub fn pass(check: &str, session_file: &Path, reason: impl Into<String>) -> Self {
        Self::new(check, session_file, true, reason.into())
    }

    pub fn fail(check: &str, session_file: &Path, reason: impl Into<String>) -> Self {
        Self::new(check, session_file, false, reason.into())
    }

    fn new(check: &str, session_file: &Path, passed: bool, reason: String) -> Self {
        Verdict {
            check: check.to_string(),
            session_file: session_file.to_path_buf(),
            passed,
            reason,
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail<T: Serialize>(mut self, detail: &T) -> Self {
        self.detail = serde_json::to_value(detail).unwrap_or(serde_json::Value::Null);
        self
    }

    pub fn summary_line(&self) -> String {
        let tag = if self.passed { "PASS" } else { "FAIL" };
        format!("{tag} [{}] {}", self.check, self.reason)
    }
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

pub fn join_or_dash(items: &BTreeSet<String>) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Left-aligned plain-text table.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let fmt_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:width$}", c, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&fmt_row(headers.to_vec()));
    out.push('\n');
    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&sep.join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&fmt_row(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const A_LOG: &str = concat!(
        r#"{"type":"tool_use","name":"Write","input":{"file_path":"app.py"}}"#,
        "\n",
        r#"{"type":"tool_use","name":"Skill","input":{"skill":"pytest"}}"#,
        "\n"
    );
    const B_LOG: &str = concat!(
        r#"{"type":"tool_use","name":"Write","input":{"file_path":"app.py"}}"#,
        "\n",
        r#"{"type":"result","is_error":true}"#,
        "\n"
    );

    fn fixture(dir: &TempDir, id: &str, body: &str) -> PathBuf {
        let p = paths::session_file(dir.path(), id);
        std::fs::write(&p, body).unwrap();
        p
    }

    fn report(dir: &TempDir, at: DateTime<Utc>) -> ComparisonReport {
        let a = ReportBuilder::summarize_variant(
            "t_a",
            &fixture(dir, "t_a", A_LOG),
            Some(SessionStatus::Exited { code: 0 }),
        );
        let b = ReportBuilder::summarize_variant(
            "t_b",
            &fixture(dir, "t_b", B_LOG),
            Some(SessionStatus::TimedOut { after_secs: 1 }),
        );
        ReportBuilder::new("t", "t").build(a, b, at)
    }

    #[test]
    fn variant_summary_from_file() {
        let dir = TempDir::new().unwrap();
        let v = ReportBuilder::summarize_variant("x", &fixture(&dir, "x", A_LOG), None);
        assert!(v.success);
        assert_eq!(v.output_line_count, 2);
        assert_eq!(v.output_byte_count, A_LOG.len() as u64);
        assert!(v.tools_used.contains("Write") && v.tools_used.contains("Skill"));
        assert!(v.skills_used.contains("pytest"));
        assert_eq!(v.exit_code, None);
    }

    #[test]
    fn missing_and_empty_sessions_are_unsuccessful() {
        let dir = TempDir::new().unwrap();
        let missing = ReportBuilder::summarize_variant("m", &dir.path().join("nope"), None);
        assert!(!missing.success);
        assert!(missing.load_error.unwrap().contains("not found"));

        let empty = ReportBuilder::summarize_variant("e", &fixture(&dir, "e", ""), None);
        assert!(!empty.success);
        assert!(empty.load_error.unwrap().contains("empty"));
    }

    #[test]
    fn comparison_fields() {
        let dir = TempDir::new().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let r = report(&dir, at);
        assert!(!r.comparison.both_successful);
        assert!(!r.comparison.tools_match);
        assert_eq!(r.variant_b.exit_code, Some(124));
        let expected = B_LOG.len() as f64 / (A_LOG.len() as f64 + 1.0);
        assert!((r.comparison.size_ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn size_ratio_guards_empty_a() {
        let a = VariantSummary {
            session_id: "a".into(),
            session_file: PathBuf::from("a"),
            exit_code: None,
            status: None,
            success: true,
            tools_used: BTreeSet::new(),
            skills_used: BTreeSet::new(),
            output_line_count: 0,
            output_byte_count: 0,
            load_error: None,
        };
        let mut b = a.clone();
        b.output_byte_count = 10;
        let c = Comparison::between(&a, &b);
        assert!((c.size_ratio - 10.0).abs() < 1e-12);
        assert!(c.tools_match && c.both_successful);
    }

    #[test]
    fn same_inputs_give_identical_json_apart_from_timestamp() {
        let dir = TempDir::new().unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let first = report(&dir, t1).to_json().unwrap();
        let second = report(&dir, t1).to_json().unwrap();
        assert_eq!(first, second);

        let t2 = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        let mut later = report(&dir, t2);
        later.timestamp = t1;
        assert_eq!(later.to_json().unwrap(), first);
    }

    #[test]
    fn write_and_load_report() {
        let dir = TempDir::new().unwrap();
        let r = report(&dir, Utc::now());
        let path = r.write(&dir.path().join("reports")).unwrap();
        assert!(path.ends_with("t_comparison.json"));
        let loaded: ComparisonReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.variant_a, r.variant_a);
        assert_eq!(loaded.variant_b, r.variant_b);
        assert_eq!(loaded.timestamp, r.timestamp);
        assert!((loaded.comparison.size_ratio - r.comparison.size_ratio).abs() < 1e-9);
    }

    #[test]
    fn summary_mentions_both_variants() {
        let dir = TempDir::new().unwrap();
        let text = report(&dir, Utc::now()).summary();
        assert!(text.contains("t_a"));
        assert!(text.contains("timed out after 1s"));
        assert!(text.contains("tools match: no"));
    }

    #[test]
    fn verdict_line() {
        let v = Verdict::fail("tool-invoked", Path::new("s.jsonl"), "expected Write; found: Bash");
        assert_eq!(v.summary_line(), "FAIL [tool-invoked] expected Write; found: Bash");
        let json = serde_json::to_value(&v).unwrap();
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn table_aligns_columns() {
        let t = render_table(&["a", "bbb"], &[vec!["xx".into(), "y".into()]]);
        assert_eq!(t, "a   bbb\n--  ---\nxx  y\n");
    }
}
