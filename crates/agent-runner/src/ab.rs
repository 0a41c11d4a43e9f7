use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use harness_core::{io, paths, HarnessError};
use harness_core::report::{ComparisonReport, ExecutionMode, ReportBuilder, VariantSummary};
use serde::Serialize;

use crate::runner::{check_dependency, SessionRunner};
use crate::types::{SessionOptions, SessionOutcome};
use crate::Result;

// ─── AbState ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbState {
    Configured,
    Running,
    Comparing,
    Done,
    Failed,
}

// ─── AbTestConfig ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AbTestConfig {
    pub test_name: String,
    pub prompt_a: String,
    pub prompt_b: String,
    pub mode: ExecutionMode,
    pub report_dir: PathBuf,
    /// Shared session settings; prompt and session id are set per variant.
    pub session: SessionOptions,
}

/// A finished A/B run.
#[derive(Debug, Clone, Serialize)]
pub struct AbOutcome {
    pub report: ComparisonReport,
    pub report_path: PathBuf,
    pub variant_a: Option<SessionOutcome>,
    pub variant_b: Option<SessionOutcome>,
}

// ─── AbTestRunner ─────────────────────────────────────────────────────────

/// Runs two prompts under identical settings and compares the sessions.
///
/// `Configured → Running → Comparing → Done`, or `Failed` on a harness-level
/// error. An agent that fails inside its session is still `Done`: the failure
/// is part of the comparison.
#[derive(Debug)]
pub struct AbTestRunner {
    config: AbTestConfig,
    state: AbState,
}

impl AbTestRunner {
    pub fn new(config: AbTestConfig) -> Self {
        Self {
            config,
            state: AbState::Configured,
        }
    }

    pub fn state(&self) -> AbState {
        self.state
    }

    fn transition(&mut self, next: AbState) {
        tracing::debug!(from = ?self.state, to = ?next, "ab state");
        self.state = next;
    }

    pub async fn run(&mut self) -> Result<AbOutcome> {
        match self.run_inner().await {
            Ok(out) => {
                self.transition(AbState::Done);
                Ok(out)
            }
            Err(e) => {
                self.transition(AbState::Failed);
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self) -> Result<AbOutcome> {
        paths::validate_name(&self.config.test_name)?;
        check_dependency(&self.config.session.agent.executable)?;
        if let Some(dir) = &self.config.session.plugin_dir {
            if !dir.is_dir() {
                return Err(HarnessError::PluginDirNotFound(dir.clone()).into());
            }
        }

        let prefix = reserve_prefix(
            &self.config.test_name,
            &self.config.session.output_dir,
            Utc::now(),
        )?;
        let id_a = paths::variant_session_id(&prefix, 'a');
        let id_b = paths::variant_session_id(&prefix, 'b');
        let runner_a =
            SessionRunner::new(self.config.session.variant(&self.config.prompt_a, id_a.clone()));
        let runner_b =
            SessionRunner::new(self.config.session.variant(&self.config.prompt_b, id_b.clone()));

        self.transition(AbState::Running);
        tracing::info!(prefix = %prefix, mode = self.config.mode.as_str(), "A/B run started");
        let (res_a, res_b) = match self.config.mode {
            ExecutionMode::Parallel => tokio::join!(runner_a.run(), runner_b.run()),
            ExecutionMode::Sequential => {
                let a = runner_a.run().await;
                let b = runner_b.run().await;
                (a, b)
            }
        };
        let outcome_a = settle("A", res_a)?;
        let outcome_b = settle("B", res_b)?;

        self.transition(AbState::Comparing);
        let out_dir = &self.config.session.output_dir;
        let summary_a = summarize(out_dir, &id_a, outcome_a.as_ref());
        let summary_b = summarize(out_dir, &id_b, outcome_b.as_ref());
        let report = ReportBuilder::new(&self.config.test_name, &prefix)
            .mode(self.config.mode)
            .build(summary_a, summary_b, Utc::now());
        let report_path = report.write(&self.config.report_dir)?;

        Ok(AbOutcome {
            report,
            report_path,
            variant_a: outcome_a,
            variant_b: outcome_b,
        })
    }
}

/// Claim a run prefix by creating variant A's session file exclusively.
/// A prefix already on disk moves the stamp forward one millisecond, so
/// concurrent runs never share (and truncate) each other's files.
fn reserve_prefix(test_name: &str, output_dir: &Path, mut at: DateTime<Utc>) -> Result<String> {
    io::ensure_dir(output_dir)?;
    loop {
        let prefix = paths::run_prefix(test_name, at);
        let file = paths::session_file(output_dir, &paths::variant_session_id(&prefix, 'a'));
        match OpenOptions::new().write(true).create_new(true).open(&file) {
            Ok(_) => return Ok(prefix),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(prefix = %prefix, "run prefix taken");
                at += chrono::Duration::milliseconds(1);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Harness-level errors abort the run; a variant that could not start for
/// other reasons is recorded as missing and compared as unsuccessful.
fn settle(label: &str, res: Result<SessionOutcome>) -> Result<Option<SessionOutcome>> {
    match res {
        Ok(out) => Ok(Some(out)),
        Err(e) if e.is_config() => Err(e),
        Err(e) => {
            tracing::warn!(variant = label, error = %e, "variant did not run");
            Ok(None)
        }
    }
}

fn summarize(out_dir: &Path, session_id: &str, outcome: Option<&SessionOutcome>) -> VariantSummary {
    let file = outcome
        .map(|o| o.session_file.clone())
        .unwrap_or_else(|| paths::session_file(out_dir, session_id));
    ReportBuilder::summarize_variant(session_id, &file, outcome.map(|o| o.status))
}

/// Rebuild a report from `session-<prefix>_a.jsonl` and `_b.jsonl` alone.
/// Exit codes are unknown and left empty.
pub fn compare_recorded(
    test_name: &str,
    prefix: &str,
    output_dir: &Path,
    report_dir: &Path,
) -> Result<(ComparisonReport, PathBuf)> {
    let id_a = paths::variant_session_id(prefix, 'a');
    let id_b = paths::variant_session_id(prefix, 'b');
    let file_a = paths::session_file(output_dir, &id_a);
    let file_b = paths::session_file(output_dir, &id_b);
    if !file_a.exists() && !file_b.exists() {
        return Err(HarnessError::SessionNotFound(file_a).into());
    }

    let a = ReportBuilder::summarize_variant(&id_a, &file_a, None);
    let b = ReportBuilder::summarize_variant(&id_b, &file_b, None);
    let report = ReportBuilder::new(test_name, prefix).build(a, b, Utc::now());
    let path = report.write(report_dir)?;
    Ok((report, path))
}

// ─── Tests ────────────────────────────────────────────────────────────────
