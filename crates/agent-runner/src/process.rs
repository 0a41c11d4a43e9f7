use std::fs::File;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::types::{PermissionMode, SessionOptions};

pub const ENV_ENABLE_TELEMETRY: &str = "CLAUDE_CODE_ENABLE_TELEMETRY";
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const ENV_PLUGIN_DIR: &str = "CLAUDE_PLUGIN_DIR";
/// Set on every child so plugins can tell they are under test.
pub const ENV_TEST_MODE: &str = "HARNESS_TEST_MODE";

// ─── Command builder ──────────────────────────────────────────────────────

/// Build the agent command line for one session.
///
/// The prompt is passed with `-p` and output is requested as `stream-json`,
/// one JSON object per line. stdout and stderr are both sent to `log`, so the
/// session file holds the combined stream in write order.
///
/// `CLAUDECODE` is removed so the harness also works from inside an agent
/// session.
pub(crate) fn build_command(opts: &SessionOptions, log: File) -> std::io::Result<Command> {
    let agent = &opts.agent;
    let mut cmd = Command::new(&agent.executable);
    cmd.args(&agent.leading_args);

    cmd.arg("-p")
        .arg(&opts.prompt)
        .arg("--output-format")
        .arg("stream-json")
        .arg("--verbose");

    if agent.permission_mode != PermissionMode::Default {
        cmd.arg("--permission-mode")
            .arg(agent.permission_mode.as_str());
    }

    if let Some(model) = &agent.model {
        cmd.arg("--model").arg(model);
    }

    if let Some(max_turns) = agent.max_turns {
        cmd.arg("--max-turns").arg(max_turns.to_string());
    }

    if !agent.allowed_tools.is_empty() {
        cmd.arg("--allowed-tools").args(&agent.allowed_tools);
    }

    if let Some(append) = &agent.append_system_prompt {
        cmd.arg("--append-system-prompt").arg(append);
    }

    if let Some(dir) = &opts.plugin_dir {
        cmd.arg("--plugin-dir").arg(dir);
        cmd.env(ENV_PLUGIN_DIR, dir);
    }

    if let Some(cwd) = &agent.cwd {
        cmd.current_dir(cwd);
    }

    cmd.env_remove("CLAUDECODE");
    cmd.env(ENV_TEST_MODE, "1");
    if opts.telemetry.enabled {
        cmd.env(ENV_ENABLE_TELEMETRY, "1")
            .env("OTEL_METRICS_EXPORTER", "otlp")
            .env("OTEL_LOGS_EXPORTER", "otlp")
            .env("OTEL_EXPORTER_OTLP_PROTOCOL", "http/json")
            .env(ENV_OTLP_ENDPOINT, &opts.telemetry.otlp_endpoint);
    } else {
        cmd.env(ENV_ENABLE_TELEMETRY, "0");
    }
    for (k, v) in &agent.env {
        cmd.env(k, v);
    }

    let err = log.try_clone()?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(err))
        .kill_on_drop(true);
    // Own process group, so a timeout reaches wrappers' children too.
    #[cfg(unix)]
    cmd.process_group(0);

    Ok(cmd)
}

// ─── Termination ──────────────────────────────────────────────────────────

/// Time between SIGTERM and SIGKILL when a session is stopped.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Stop the agent and everything it spawned, then reap it.
///
/// On unix the whole process group gets SIGTERM, then SIGKILL after
/// [`KILL_GRACE`] or as soon as the leader exits, whichever comes first.
pub(crate) async fn terminate_tree(child: &mut Child) -> std::io::Result<()> {
    match child.id() {
        Some(pid) => stop_group(pid, child).await,
        None => Ok(()),
    }
}

#[cfg(unix)]
async fn stop_group(pid: u32, child: &mut Child) -> std::io::Result<()> {
    if !signal_group(pid, libc::SIGTERM) {
        child.start_kill()?;
    }
    let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
    signal_group(pid, libc::SIGKILL);
    child.wait().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn stop_group(_pid: u32, child: &mut Child) -> std::io::Result<()> {
    child.kill().await
}

/// Signal the group led by `pid`. False when no member was left to signal.
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) with a negative pid only sends a signal; no memory is shared.
    unsafe { libc::kill(-pgid, signal) == 0 }
}

// ─── Tests ────────────────────────────────────────────────────────────────
