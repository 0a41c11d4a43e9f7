use crate::error::{HarnessError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

/// How to launch the agent executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_executable")]
    pub executable: String,
    /// Placed before the harness flags, e.g. `["-y", "@anthropic-ai/claude-code"]`
    /// when `executable` is `npx`.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub append_system_prompt: Option<String>,
    /// Extra environment for the child, applied after the harness's own.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

fn default_executable() -> String {
    "claude".to_string()
}

fn default_permission_mode() -> String {
    "bypassPermissions".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            args: Vec::new(),
            model: None,
            max_turns: None,
            permission_mode: default_permission_mode(),
            allowed_tools: Vec::new(),
            append_system_prompt: None,
            env: BTreeMap::new(),
            cwd: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TelemetryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,
}

fn default_true() -> bool {
    true
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4318".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: default_otlp_endpoint(),
        }
    }
}

// ---------------------------------------------------------------------------
// PromptPair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    pub prompt_a: String,
    pub prompt_b: String,
}

impl PromptPair {
    /// Baseline-vs-skill pair: A states the task, B asks for the same task
    /// through the named skill.
    pub fn for_skill(skill: &str) -> Self {
        let task = format!("Write a small example project that demonstrates {skill} best practices.");
        PromptPair {
            prompt_b: format!("Use the {skill} skill. {task}"),
            prompt_a: task,
        }
    }
}

// ---------------------------------------------------------------------------
// HarnessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// When set, the plugin directory path is written here before each spawn
    /// for nested invocations that do not inherit the environment.
    #[serde(default)]
    pub marker_file: Option<PathBuf>,
    #[serde(default)]
    pub prompt_pairs: BTreeMap<String, PromptPair>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_OUTPUT_DIR)
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_REPORT_DIR)
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            output_dir: default_output_dir(),
            report_dir: default_report_dir(),
            timeout_secs: default_timeout_secs(),
            plugin_dir: None,
            parallel: true,
            telemetry: TelemetryConfig::default(),
            marker_file: None,
            prompt_pairs: BTreeMap::new(),
        }
    }
}

impl HarnessConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                HarnessError::InvalidConfig(format!("config file not found: {}", path.display()))
            }
            _ => HarnessError::Io(e),
        })?;
        // An empty file deserializes to `null`; treat it as all defaults.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: HarnessConfig = serde_yaml::from_str(&data)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    /// `<dir>/harness.yaml` when it exists, else defaults.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(paths::CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.executable.trim().is_empty() {
            return Err(HarnessError::InvalidConfig(
                "agent.executable must not be empty".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(HarnessError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(dir) = &self.plugin_dir {
            if !dir.is_dir() {
                return Err(HarnessError::PluginDirNotFound(dir.clone()));
            }
        }
        Ok(())
    }

    /// Configured pair for `skill`, or the built-in baseline-vs-skill pair.
    pub fn prompt_pair(&self, skill: &str) -> PromptPair {
        self.prompt_pairs
            .get(skill)
            .cloned()
            .unwrap_or_else(|| PromptPair::for_skill(skill))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.agent.executable, "claude");
        assert_eq!(cfg.agent.permission_mode, "bypassPermissions");
        assert_eq!(cfg.output_dir, PathBuf::from("test-output/sessions"));
        assert_eq!(cfg.timeout_secs, 300);
        assert!(cfg.parallel);
        assert!(cfg.telemetry.enabled);
        assert_eq!(cfg.telemetry.otlp_endpoint, "http://localhost:4318");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "agent:\n  executable: sh\n  args: [\"-c\", \"true\"]\ntimeout_secs: 5\n";
        let cfg: HarnessConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.agent.executable, "sh");
        assert_eq!(cfg.agent.args, vec!["-c", "true"]);
        assert_eq!(cfg.agent.permission_mode, "bypassPermissions");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.report_dir, PathBuf::from("test-output/reports"));
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let cfg = HarnessConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn load_or_default_reads_prompt_pairs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("harness.yaml"),
            "prompt_pairs:\n  pytest:\n    prompt_a: a\n    prompt_b: b\n",
        )
        .unwrap();
        let cfg = HarnessConfig::load_or_default(dir.path()).unwrap();
        let pair = cfg.prompt_pair("pytest");
        assert_eq!((pair.prompt_a.as_str(), pair.prompt_b.as_str()), ("a", "b"));
        assert_eq!(cfg.timeout_secs, 300);
    }

    #[test]
    fn missing_explicit_config_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = HarnessConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harness.yaml");
        std::fs::write(&path, "timeout_secs: [oops").unwrap();
        assert!(HarnessConfig::load(&path).unwrap_err().is_config());
    }

    #[test]
    fn validate_plugin_dir() {
        let dir = TempDir::new().unwrap();
        let mut cfg = HarnessConfig {
            plugin_dir: Some(dir.path().join("missing")),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(HarnessError::PluginDirNotFound(_))
        ));
        cfg.plugin_dir = Some(dir.path().to_path_buf());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn prompt_pair_falls_back_to_builtin() {
        let cfg = HarnessConfig::default();
        let pair = cfg.prompt_pair("terraform");
        assert!(!pair.prompt_a.contains("skill"));
        assert!(pair.prompt_b.starts_with("Use the terraform skill."));
        assert!(pair.prompt_b.ends_with(&pair.prompt_a));
    }
}
