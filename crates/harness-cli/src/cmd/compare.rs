use crate::cmd::load_config;
use crate::output::Output;
use anyhow::{Context, Result};
use harness_core::paths;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(clap::Args, Debug)]
pub struct CompareArgs {
    /// Run prefix shared by session-<prefix>_a.jsonl and session-<prefix>_b.jsonl
    #[arg(long)]
    pub prefix: String,

    /// Name recorded in the report (default: prefix without its timestamp)
    #[arg(long)]
    pub test_name: Option<String>,

    #[arg(long, env = "HARNESS_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, env = "HARNESS_REPORT_DIR")]
    pub report_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct CompareOutput<'a> {
    report: &'a harness_core::report::ComparisonReport,
    report_path: &'a Path,
}

pub fn run(config: Option<&Path>, args: CompareArgs, out: Output) -> Result<i32> {
    let cfg = load_config(config)?;
    paths::validate_name(&args.prefix)?;
    let output_dir = args.output_dir.unwrap_or(cfg.output_dir);
    let report_dir = args.report_dir.unwrap_or(cfg.report_dir);
    let test_name = args
        .test_name
        .unwrap_or_else(|| paths::test_name_from_prefix(&args.prefix).to_string());

    let (report, report_path) =
        agent_runner::compare_recorded(&test_name, &args.prefix, &output_dir, &report_dir)
            .with_context(|| format!("cannot compare sessions for prefix '{}'", args.prefix))?;

    out.emit(
        &CompareOutput {
            report: &report,
            report_path: &report_path,
        },
        || format!("{}\nreport: {}", report.summary(), report_path.display()),
    )?;
    Ok(0)
}
