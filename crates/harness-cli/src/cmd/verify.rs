use crate::output::{print_table, Output};
use anyhow::{Context, Result};
use harness_core::report::{join_or_dash, Verdict};
use harness_core::session::SessionLog;
use harness_core::verify::{skill, telemetry, tool};
use harness_core::HarnessError;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

#[derive(clap::Subcommand, Debug)]
pub enum VerifyTarget {
    /// Tool usage checks
    Tool {
        /// Session log (session-<id>.jsonl)
        file: PathBuf,
        #[command(subcommand)]
        check: ToolCheck,
    },
    /// Skill invocation checks
    Skill {
        /// Session log (session-<id>.jsonl)
        file: PathBuf,
        #[command(subcommand)]
        check: SkillCheck,
    },
    /// Telemetry event checks
    Telemetry {
        /// Session log (session-<id>.jsonl)
        file: PathBuf,
        #[command(subcommand)]
        check: TelemetryCheck,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ToolCheck {
    /// Assert the tool was called at least once
    Invoked { tool: String },
    /// Print how many times the tool was called
    Count { tool: String },
    /// List every distinct tool called
    List,
    /// Assert a Write call targeted PATH (exact, suffix or substring match)
    FileCreated { path: String },
    /// Print each call of the tool with its result
    Results { tool: String },
    /// Assert no record carries an error indicator
    Success,
}

#[derive(clap::Subcommand, Debug)]
pub enum SkillCheck {
    /// Assert the skill was invoked
    Invoked { skill: String },
    /// Print how many times the skill was invoked
    Count { skill: String },
    /// List every distinct skill invoked
    List,
    /// Assert every listed skill was invoked; extra skills are reported only
    Expect {
        #[arg(required = true)]
        skills: Vec<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum TelemetryCheck {
    /// Assert at least one event of this type was recorded
    Has { event_type: String },
    /// Print how many records carry this event type
    Count { event_type: String },
    /// List every distinct event type
    List,
    /// Check the expected event types; passes when any one is present
    All,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(target: VerifyTarget, out: Output) -> Result<i32> {
    match target {
        VerifyTarget::Tool { file, check } => with_log(&file, out, |log| tool_check(log, check, out)),
        VerifyTarget::Skill { file, check } => {
            with_log(&file, out, |log| skill_check(log, check, out))
        }
        VerifyTarget::Telemetry { file, check } => {
            with_log(&file, out, |log| telemetry_check(log, check, out))
        }
    }
}

/// Load the log, turning an empty file into a failed check (exit 1) rather
/// than an error.
fn with_log(file: &Path, out: Output, f: impl FnOnce(&SessionLog) -> Result<i32>) -> Result<i32> {
    match SessionLog::load(file) {
        Ok(log) => f(&log),
        Err(e @ HarnessError::EmptySession(_)) => {
            out.verdict(&Verdict::fail("load", file, e.to_string()))
        }
        Err(e) => Err(e).with_context(|| format!("cannot read session log {}", file.display())),
    }
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

fn tool_check(log: &SessionLog, check: ToolCheck, out: Output) -> Result<i32> {
    let file = log.path();
    match check {
        ToolCheck::Invoked { tool: name } => {
            let n = tool::count_tool_calls(log, &name);
            let verdict = if n > 0 {
                Verdict::pass("tool-invoked", file, format!("{name} invoked {n} time(s)"))
            } else {
                Verdict::fail(
                    "tool-invoked",
                    file,
                    format!(
                        "expected {name} to be invoked; tools used: {}",
                        join_or_dash(&tool::list_all_tools(log))
                    ),
                )
            };
            out.verdict(&verdict.with_detail(&json!({ "tool": name, "count": n })))
        }
        ToolCheck::Count { tool: name } => {
            let n = tool::count_tool_calls(log, &name);
            count(out, json!({ "tool": name, "count": n }), n)
        }
        ToolCheck::List => list(out, &tool::list_all_tools(log)),
        ToolCheck::FileCreated { path } => {
            let verdict = if tool::was_file_created(log, &path) {
                Verdict::pass("file-created", file, format!("Write targeted {path}"))
            } else {
                let written = tool::written_paths(log);
                let found = if written.is_empty() {
                    "no Write calls".to_string()
                } else {
                    format!("written: {}", written.join(", "))
                };
                Verdict::fail(
                    "file-created",
                    file,
                    format!("expected a Write to {path}; {found}"),
                )
            };
            out.verdict(&verdict)
        }
        ToolCheck::Results { tool: name } => {
            let results: Vec<_> = tool::extract_tool_results(log, &name).collect();
            if out.json {
                crate::output::print_json(&results)?;
            } else if !out.quiet {
                let rows: Vec<Vec<String>> = results
                    .iter()
                    .map(|r| {
                        vec![
                            r.line.to_string(),
                            if r.success { "ok" } else { "error" }.to_string(),
                            r.output.map(preview).unwrap_or_else(|| "-".to_string()),
                        ]
                    })
                    .collect();
                print_table(&["LINE", "STATUS", "OUTPUT"], &rows);
            }
            Ok(0)
        }
        ToolCheck::Success => {
            let verdict = match tool::first_error(log) {
                None => Verdict::pass(
                    "session-success",
                    file,
                    format!("no error indicators in {} records", log.len()),
                ),
                Some(rec) => Verdict::fail(
                    "session-success",
                    file,
                    format!(
                        "expected no error indicators; line {} reports an error: {}",
                        rec.line,
                        preview(&rec.raw)
                    ),
                ),
            };
            out.verdict(&verdict)
        }
    }
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

fn skill_check(log: &SessionLog, check: SkillCheck, out: Output) -> Result<i32> {
    let file = log.path();
    match check {
        SkillCheck::Invoked { skill: name } => {
            let n = skill::count_skill_invocations(log, &name);
            let verdict = if n > 0 {
                Verdict::pass("skill-invoked", file, format!("{name} invoked {n} time(s)"))
            } else {
                Verdict::fail(
                    "skill-invoked",
                    file,
                    format!(
                        "expected skill {name}; skills invoked: {}",
                        join_or_dash(&skill::list_skills_invoked(log))
                    ),
                )
            };
            out.verdict(&verdict)
        }
        SkillCheck::Count { skill: name } => {
            let n = skill::count_skill_invocations(log, &name);
            count(out, json!({ "skill": name, "count": n }), n)
        }
        SkillCheck::List => list(out, &skill::list_skills_invoked(log)),
        SkillCheck::Expect { skills } => {
            let expected: BTreeSet<String> = skills.into_iter().collect();
            let cmp = skill::compare_expected_skills(log, &expected);
            let reason = format!(
                "found: {}; missing: {}; extra: {}",
                join_or_dash(&cmp.found),
                join_or_dash(&cmp.missing),
                join_or_dash(&cmp.extra)
            );
            let verdict = if cmp.passed() {
                Verdict::pass("skills-expected", file, reason)
            } else {
                Verdict::fail("skills-expected", file, reason)
            };
            out.verdict(&verdict.with_detail(&cmp))
        }
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

fn telemetry_check(log: &SessionLog, check: TelemetryCheck, out: Output) -> Result<i32> {
    let file = log.path();
    match check {
        TelemetryCheck::Has { event_type } => {
            let verdict = if telemetry::has_event_type(log, &event_type) {
                Verdict::pass("telemetry-has", file, format!("{event_type} present"))
            } else {
                Verdict::fail(
                    "telemetry-has",
                    file,
                    format!(
                        "expected a {event_type} event; types seen: {}",
                        join_or_dash(&telemetry::list_event_types(log))
                    ),
                )
            };
            out.verdict(&verdict)
        }
        TelemetryCheck::Count { event_type } => {
            let n = telemetry::count_event_type(log, &event_type);
            count(out, json!({ "event_type": event_type, "count": n }), n)
        }
        TelemetryCheck::List => list(out, &telemetry::list_event_types(log)),
        TelemetryCheck::All => {
            let summary = telemetry::verify_all(log);
            let verdict = if summary.passed() {
                Verdict::pass(
                    "telemetry-all",
                    file,
                    format!(
                        "found: {}; missing: {}",
                        join_or_dash(&summary.expected_found),
                        join_or_dash(&summary.expected_missing)
                    ),
                )
            } else {
                Verdict::fail(
                    "telemetry-all",
                    file,
                    format!(
                        "no telemetry events ({}); is telemetry enabled? types seen: {}",
                        telemetry::EXPECTED_EVENT_TYPES.join(", "),
                        join_or_dash(&summary.all_types_seen)
                    ),
                )
            };
            out.verdict(&verdict.with_detail(&summary))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn count(out: Output, detail: serde_json::Value, n: usize) -> Result<i32> {
    if out.json {
        crate::output::print_json(&detail)?;
    } else {
        println!("{n}");
    }
    Ok(0)
}

fn list(out: Output, items: &BTreeSet<String>) -> Result<i32> {
    if out.json {
        crate::output::print_json(items)?;
    } else {
        for item in items {
            println!("{item}");
        }
    }
    Ok(0)
}

const PREVIEW_CHARS: usize = 80;

fn preview(value: &serde_json::Value) -> String {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let one_line = text.replace('\n', " ");
    if one_line.chars().count() > PREVIEW_CHARS {
        let cut: String = one_line.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        one_line
    }
}
