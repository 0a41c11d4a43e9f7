//! `agent-runner`: drives a headless coding agent as a subprocess.
//!
//! # Architecture
//!
//! ```text
//! SessionOptions
//!     │
//!     ▼
//! SessionRunner   ← spawns `claude -p <prompt> --output-format stream-json …`
//!     │              stdout+stderr → <output_dir>/session-<id>.jsonl
//!     ▼
//! SessionOutcome  ← session id, file, exit status (timeout is its own state)
//!
//! AbTestRunner    ← two SessionRunners (joined or one after the other)
//!     │
//!     ▼
//! ComparisonReport (harness-core) → <report_dir>/<prefix>_comparison.json
//! ```

pub mod ab;
pub mod error;
pub(crate) mod process;
pub mod runner;
pub mod types;

pub use ab::{compare_recorded, AbOutcome, AbState, AbTestConfig, AbTestRunner};
pub use error::RunnerError;
pub use process::{ENV_ENABLE_TELEMETRY, ENV_OTLP_ENDPOINT, ENV_PLUGIN_DIR, ENV_TEST_MODE};
pub use runner::{check_dependency, SessionRunner};
pub use types::{AgentOptions, PermissionMode, SessionOptions, SessionOutcome, TelemetrySettings};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, RunnerError>;
