use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Instant;

use chrono::Utc;
use harness_core::status::SessionStatus;
use harness_core::{io, paths, HarnessError};

use crate::process::{build_command, terminate_tree};
use crate::types::{SessionOptions, SessionOutcome};
use crate::{Result, RunnerError};

// ─── Dependency check ─────────────────────────────────────────────────────

/// Resolve the agent executable on PATH before anything is spawned.
pub fn check_dependency(executable: &str) -> Result<PathBuf> {
    which::which(executable).map_err(|_| RunnerError::MissingDependency(executable.to_string()))
}

// ─── SessionRunner ────────────────────────────────────────────────────────

/// Runs one agent session to completion or timeout.
///
/// Instances share nothing but the output directory; concurrent runners are
/// safe as long as their session ids differ.
#[derive(Debug, Clone)]
pub struct SessionRunner {
    opts: SessionOptions,
}

impl SessionRunner {
    pub fn new(opts: SessionOptions) -> Self {
        Self { opts }
    }

    /// Spawn the agent, capture its output to `<output_dir>/session-<id>.jsonl`
    /// and wait at most `timeout`.
    ///
    /// A non-zero exit or a timeout is returned as a [`SessionStatus`], not an
    /// error. Errors mean the session never started.
    pub async fn run(&self) -> Result<SessionOutcome> {
        let opts = &self.opts;
        if let Some(dir) = &opts.plugin_dir {
            if !dir.is_dir() {
                return Err(HarnessError::PluginDirNotFound(dir.clone()).into());
            }
        }

        let session_id = match &opts.session_id {
            Some(id) => {
                paths::validate_name(id)?;
                id.clone()
            }
            None => uuid::Uuid::new_v4().to_string(),
        };

        io::ensure_dir(&opts.output_dir)?;
        let session_file = paths::session_file(&opts.output_dir, &session_id);
        let log = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&session_file)?;

        if let (Some(marker), Some(dir)) = (&opts.marker_file, &opts.plugin_dir) {
            io::atomic_write(marker, dir.to_string_lossy().as_bytes())?;
        }

        let mut cmd = build_command(opts, log)?;
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                RunnerError::MissingDependency(opts.agent.executable.clone())
            }
            _ => RunnerError::Spawn(format!("{}: {e}", opts.agent.executable)),
        })?;
        tracing::info!(
            session = %session_id,
            pid = child.id().unwrap_or_default(),
            file = %session_file.display(),
            "agent started"
        );

        let status = match tokio::time::timeout(opts.timeout, child.wait()).await {
            Ok(waited) => status_from_exit(waited?),
            Err(_) => {
                tracing::warn!(
                    session = %session_id,
                    timeout_secs = opts.timeout.as_secs(),
                    "agent timed out; killing"
                );
                if let Err(e) = terminate_tree(&mut child).await {
                    tracing::warn!(session = %session_id, error = %e, "kill failed");
                }
                SessionStatus::TimedOut {
                    after_secs: opts.timeout.as_secs(),
                }
            }
        };

        let duration_ms = clock.elapsed().as_millis() as u64;
        tracing::info!(
            session = %session_id,
            status = %status.label(),
            duration_ms,
            "agent finished"
        );

        Ok(SessionOutcome {
            session_id,
            session_file,
            exit_code: status.exit_code(),
            status,
            started_at,
            duration_ms,
        })
    }
}

fn status_from_exit(status: ExitStatus) -> SessionStatus {
    if let Some(code) = status.code() {
        return SessionStatus::Exited { code };
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        SessionStatus::Killed {
            signal: status.signal(),
        }
    }
    #[cfg(not(unix))]
    {
        SessionStatus::Killed { signal: None }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
