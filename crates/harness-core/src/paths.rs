use crate::error::{HarnessError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DEFAULT_OUTPUT_DIR: &str = "test-output/sessions";
pub const DEFAULT_REPORT_DIR: &str = "test-output/reports";
pub const CONFIG_FILE: &str = "harness.yaml";

const SESSION_PREFIX: &str = "session-";
const SESSION_EXT: &str = ".jsonl";
const COMPARISON_SUFFIX: &str = "_comparison.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn session_file(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{SESSION_PREFIX}{session_id}{SESSION_EXT}"))
}

pub fn comparison_report_file(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}{COMPARISON_SUFFIX}"))
}

/// `<test_name>_<YYYYmmdd_HHMMSS_mmm>`: namespaces both sessions of an A/B run.
pub fn run_prefix(test_name: &str, at: DateTime<Utc>) -> String {
    format!("{test_name}_{}", at.format("%Y%m%d_%H%M%S_%3f"))
}

/// Inverse of [`run_prefix`]: drops a trailing `_YYYYmmdd_HHMMSS` stamp,
/// with or without milliseconds. Prefixes without one are returned unchanged.
pub fn test_name_from_prefix(prefix: &str) -> &str {
    match stamp_re().find(prefix) {
        Some(m) if m.start() > 0 => &prefix[..m.start()],
        _ => prefix,
    }
}

/// Session id of one variant of an A/B run, e.g. `<prefix>_a`.
pub fn variant_session_id(prefix: &str, variant: char) -> String {
    format!("{prefix}_{variant}")
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();
static STAMP_RE: OnceLock<Regex> = OnceLock::new();

fn stamp_re() -> &'static Regex {
    STAMP_RE.get_or_init(|| Regex::new(r"_\d{8}_\d{6}(?:_\d{3})?$").unwrap())
}

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*$").unwrap())
}

/// Test names and session ids become file names, so keep them to a safe set.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 || !name_re().is_match(name) {
        return Err(HarnessError::InvalidTestName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
