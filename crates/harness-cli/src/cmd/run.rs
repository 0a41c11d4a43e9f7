use crate::cmd::{block_on, load_config, session_options, SessionArgs};
use crate::output::Output;
use agent_runner::{check_dependency, SessionRunner};
use anyhow::{Context, Result};
use std::path::Path;

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Prompt given to the agent
    pub prompt: String,

    /// Session id (default: random UUID)
    #[arg(long)]
    pub session_id: Option<String>,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Exit code is the session's own: 0, the child's code, or 124 on timeout.
pub fn run(config: Option<&Path>, args: RunArgs, out: Output) -> Result<i32> {
    let mut cfg = load_config(config)?;
    args.session.apply(&mut cfg);

    let mut opts = session_options(&cfg, &args.prompt)?;
    opts.session_id = args.session_id;
    check_dependency(&opts.agent.executable)?;

    let outcome = block_on(SessionRunner::new(opts).run())?.context("agent session failed")?;

    out.emit(&outcome, || {
        format!(
            "session {}: {} (exit {})\nlog: {}",
            outcome.session_id,
            outcome.status.label(),
            outcome.exit_code,
            outcome.session_file.display()
        )
    })?;
    Ok(outcome.exit_code)
}
