use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("session log not found: {}", .0.display())]
    SessionNotFound(PathBuf),

    #[error("session log is empty: {} (agent likely exited before emitting any output)", .0.display())]
    EmptySession(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("plugin directory not found: {}", .0.display())]
    PluginDirNotFound(PathBuf),

    #[error("invalid test name '{0}': must be alphanumeric with '-', '_' or '.'")]
    InvalidTestName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// True for errors that mean "the harness was misconfigured or misused",
    /// as opposed to a run that happened and produced bad data.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            HarnessError::InvalidConfig(_)
                | HarnessError::PluginDirNotFound(_)
                | HarnessError::InvalidTestName(_)
                | HarnessError::Yaml(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
