use crate::cmd::{block_on, load_config, session_options, SessionArgs};
use crate::output::Output;
use agent_runner::{AbTestConfig, AbTestRunner};
use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use harness_core::config::PromptPair;
use harness_core::report::ExecutionMode;
use std::path::{Path, PathBuf};

const DEFAULT_TEST_NAME: &str = "ab_test";

#[derive(clap::Args, Debug)]
pub struct AbArgs {
    /// Prompt for variant A
    #[arg(long, requires = "prompt_b", required_unless_present = "skill")]
    pub prompt_a: Option<String>,

    /// Prompt for variant B
    #[arg(long, requires = "prompt_a")]
    pub prompt_b: Option<String>,

    /// Use the prompt pair configured for this skill (or the built-in
    /// baseline-vs-skill pair)
    #[arg(long, conflicts_with_all = ["prompt_a", "prompt_b"])]
    pub skill: Option<String>,

    /// Name used in the session and report file prefix
    #[arg(long)]
    pub test_name: Option<String>,

    /// Run B only after A exits
    #[arg(long)]
    pub sequential: bool,

    #[arg(long, env = "HARNESS_PARALLEL", hide = true, value_parser = BoolishValueParser::new())]
    pub parallel: Option<bool>,

    /// Directory for the comparison report
    #[arg(long, env = "HARNESS_REPORT_DIR")]
    pub report_dir: Option<PathBuf>,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Exit 0 whenever a report was written; divergence between variants is data.
pub fn run(config: Option<&Path>, args: AbArgs, out: Output) -> Result<i32> {
    let mut cfg = load_config(config)?;
    args.session.apply(&mut cfg);
    if let Some(dir) = &args.report_dir {
        cfg.report_dir = dir.clone();
    }

    let (pair, default_name) = match (&args.skill, args.prompt_a, args.prompt_b) {
        (Some(skill), _, _) => (cfg.prompt_pair(skill), skill.clone()),
        (None, Some(prompt_a), Some(prompt_b)) => (
            PromptPair { prompt_a, prompt_b },
            DEFAULT_TEST_NAME.to_string(),
        ),
        _ => anyhow::bail!("either --skill or both --prompt-a and --prompt-b are required"),
    };

    let parallel = !args.sequential && args.parallel.unwrap_or(cfg.parallel);
    let ab_config = AbTestConfig {
        test_name: args.test_name.unwrap_or(default_name),
        prompt_a: pair.prompt_a,
        prompt_b: pair.prompt_b,
        mode: if parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        },
        report_dir: cfg.report_dir.clone(),
        session: session_options(&cfg, "")?,
    };

    let mut runner = AbTestRunner::new(ab_config);
    let outcome = block_on(runner.run())?.context("A/B run failed")?;

    out.emit(&outcome, || {
        format!(
            "{}\nreport: {}",
            outcome.report.summary(),
            outcome.report_path.display()
        )
    })?;
    Ok(0)
}
