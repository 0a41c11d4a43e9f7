use harness_core::HarnessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("required executable not found on PATH: {0}")]
    MissingDependency(String),

    #[error(transparent)]
    Config(#[from] HarnessError),

    #[error("failed to spawn agent: {0}")]
    Spawn(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Misuse or environment problems that stop a run before anything spawns.
    pub fn is_config(&self) -> bool {
        match self {
            RunnerError::MissingDependency(_) => true,
            RunnerError::Config(e) => e.is_config(),
            RunnerError::Spawn(_) | RunnerError::Io(_) => false,
        }
    }
}
