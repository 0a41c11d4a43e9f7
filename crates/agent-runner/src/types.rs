use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use harness_core::config::{AgentConfig, HarnessConfig};
use harness_core::status::SessionStatus;
use harness_core::HarnessError;
use serde::Serialize;

// ─── PermissionMode ───────────────────────────────────────────────────────

/// Permission handling passed to the agent as `--permission-mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionMode {
    /// Standard: prompts for dangerous operations
    Default,
    /// Auto-accept file edit operations
    AcceptEdits,
    /// Skip all permission checks. Unattended runs need this.
    #[default]
    BypassPermissions,
    /// Planning mode, no tool execution
    Plan,
    /// Don't prompt; deny if not pre-approved
    DontAsk,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
            PermissionMode::DontAsk => "dontAsk",
        }
    }
}

impl FromStr for PermissionMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(PermissionMode::Default),
            "acceptEdits" => Ok(PermissionMode::AcceptEdits),
            "bypassPermissions" => Ok(PermissionMode::BypassPermissions),
            "plan" => Ok(PermissionMode::Plan),
            "dontAsk" => Ok(PermissionMode::DontAsk),
            other => Err(HarnessError::InvalidConfig(format!(
                "unknown permission mode '{other}'"
            ))),
        }
    }
}

// ─── AgentOptions ─────────────────────────────────────────────────────────

/// Executable and flags for the agent subprocess.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOptions {
    /// Binary to launch (default: `"claude"`)
    pub executable: String,
    /// Arguments placed before the harness's own flags
    pub leading_args: Vec<String>,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    pub permission_mode: PermissionMode,
    /// Tool names auto-approved without prompting
    pub allowed_tools: Vec<String>,
    /// Text appended to the agent's default system prompt
    pub append_system_prompt: Option<String>,
    /// Extra environment for the child, applied last
    pub env: BTreeMap<String, String>,
    /// Working directory for the child (default: current dir)
    pub cwd: Option<PathBuf>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            executable: "claude".to_string(),
            leading_args: Vec::new(),
            model: None,
            max_turns: None,
            permission_mode: PermissionMode::default(),
            allowed_tools: Vec::new(),
            append_system_prompt: None,
            env: BTreeMap::new(),
            cwd: None,
        }
    }
}

impl TryFrom<&AgentConfig> for AgentOptions {
    type Error = HarnessError;

    fn try_from(cfg: &AgentConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            executable: cfg.executable.clone(),
            leading_args: cfg.args.clone(),
            model: cfg.model.clone(),
            max_turns: cfg.max_turns,
            permission_mode: cfg.permission_mode.parse()?,
            allowed_tools: cfg.allowed_tools.clone(),
            append_system_prompt: cfg.append_system_prompt.clone(),
            env: cfg.env.clone(),
            cwd: cfg.cwd.clone(),
        })
    }
}

// ─── TelemetrySettings ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub otlp_endpoint: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: "http://localhost:4318".to_string(),
        }
    }
}

// ─── SessionOptions ───────────────────────────────────────────────────────

/// Everything one agent session needs. Passed explicitly to the spawn call;
/// nothing is read from the harness's own environment at spawn time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub prompt: String,
    pub timeout: Duration,
    /// Generated (UUID v4) when `None`
    pub session_id: Option<String>,
    pub output_dir: PathBuf,
    pub plugin_dir: Option<PathBuf>,
    /// Side-channel file receiving the plugin dir path before spawn
    pub marker_file: Option<PathBuf>,
    pub telemetry: TelemetrySettings,
    pub agent: AgentOptions,
}

impl SessionOptions {
    pub fn new(prompt: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            timeout: Duration::from_secs(300),
            session_id: None,
            output_dir: output_dir.into(),
            plugin_dir: None,
            marker_file: None,
            telemetry: TelemetrySettings::default(),
            agent: AgentOptions::default(),
        }
    }

    /// Options for `prompt` with every other field taken from `cfg`.
    pub fn from_config(prompt: impl Into<String>, cfg: &HarnessConfig) -> Result<Self, HarnessError> {
        Ok(Self {
            prompt: prompt.into(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            session_id: None,
            output_dir: cfg.output_dir.clone(),
            plugin_dir: cfg.plugin_dir.clone(),
            marker_file: cfg.marker_file.clone(),
            telemetry: TelemetrySettings {
                enabled: cfg.telemetry.enabled,
                otlp_endpoint: cfg.telemetry.otlp_endpoint.clone(),
            },
            agent: AgentOptions::try_from(&cfg.agent)?,
        })
    }

    /// Same options with a different prompt and session id.
    pub fn variant(&self, prompt: &str, session_id: String) -> Self {
        Self {
            prompt: prompt.to_string(),
            session_id: Some(session_id),
            ..self.clone()
        }
    }
}

// ─── SessionOutcome ───────────────────────────────────────────────────────

/// What a finished (or timed-out) session left behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub session_file: PathBuf,
    pub status: SessionStatus,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_mode_round_trips_through_str() {
        for mode in [
            PermissionMode::Default,
            PermissionMode::AcceptEdits,
            PermissionMode::BypassPermissions,
            PermissionMode::Plan,
            PermissionMode::DontAsk,
        ] {
            assert_eq!(mode.as_str().parse::<PermissionMode>().unwrap(), mode);
        }
        assert!("yolo".parse::<PermissionMode>().unwrap_err().is_config());
    }

    #[test]
    fn options_from_config() {
        let mut cfg = HarnessConfig::default();
        cfg.agent.executable = "npx".into();
        cfg.agent.args = vec!["-y".into(), "@anthropic-ai/claude-code".into()];
        cfg.agent.permission_mode = "acceptEdits".into();
        cfg.timeout_secs = 7;
        cfg.telemetry.enabled = false;

        let opts = SessionOptions::from_config("hi", &cfg).unwrap();
        assert_eq!(opts.prompt, "hi");
        assert_eq!(opts.timeout, Duration::from_secs(7));
        assert_eq!(opts.agent.executable, "npx");
        assert_eq!(opts.agent.leading_args.len(), 2);
        assert_eq!(opts.agent.permission_mode, PermissionMode::AcceptEdits);
        assert!(!opts.telemetry.enabled);
    }

    #[test]
    fn variant_keeps_everything_but_prompt_and_id() {
        let base = SessionOptions::new("base", "/tmp/out");
        let v = base.variant("other", "p_a".into());
        assert_eq!(v.prompt, "other");
        assert_eq!(v.session_id.as_deref(), Some("p_a"));
        assert_eq!(v.output_dir, base.output_dir);
        assert_eq!(v.agent, base.agent);
    }
}
