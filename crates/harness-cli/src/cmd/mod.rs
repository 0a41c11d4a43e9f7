pub mod ab;
pub mod compare;
pub mod run;
pub mod verify;

use agent_runner::SessionOptions;
use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use harness_core::config::HarnessConfig;
use std::future::Future;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Shared session flags
// ---------------------------------------------------------------------------

/// Flags shared by `run` and `ab`. Each overrides the matching config field;
/// env vars sit between the flag and the file.
#[derive(clap::Args, Debug)]
pub struct SessionArgs {
    /// Timeout per session in seconds [config: timeout_secs, default 300]
    #[arg(long, env = "HARNESS_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Directory for session-<id>.jsonl files
    #[arg(long, env = "HARNESS_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Plugin directory passed to the agent (must exist)
    #[arg(long, env = "HARNESS_PLUGIN_DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Model override
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum agent turns
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Do not enable agent telemetry
    #[arg(long)]
    pub no_telemetry: bool,

    #[arg(long, env = "CLAUDE_CODE_ENABLE_TELEMETRY", hide = true, value_parser = BoolishValueParser::new())]
    pub telemetry: Option<bool>,

    /// OTLP endpoint for agent telemetry
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl SessionArgs {
    /// Fold these flags into the loaded config.
    pub fn apply(&self, cfg: &mut HarnessConfig) {
        if let Some(t) = self.timeout {
            cfg.timeout_secs = t;
        }
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(dir) = &self.plugin_dir {
            cfg.plugin_dir = Some(dir.clone());
        }
        if let Some(m) = &self.model {
            cfg.agent.model = Some(m.clone());
        }
        if let Some(n) = self.max_turns {
            cfg.agent.max_turns = Some(n);
        }
        if let Some(enabled) = self.telemetry {
            cfg.telemetry.enabled = enabled;
        }
        if self.no_telemetry {
            cfg.telemetry.enabled = false;
        }
        if let Some(ep) = &self.otlp_endpoint {
            cfg.telemetry.otlp_endpoint = ep.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `--config` when given, else `./harness.yaml` when present, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(p) => HarnessConfig::load(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => HarnessConfig::load_or_default(Path::new("."))
            .context("failed to load ./harness.yaml"),
    }
}

/// Validated config plus session options for `prompt`.
pub fn session_options(cfg: &HarnessConfig, prompt: &str) -> Result<SessionOptions> {
    cfg.validate().context("invalid configuration")?;
    SessionOptions::from_config(prompt, cfg).context("invalid agent configuration")
}

pub fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    Ok(rt.block_on(fut))
}
