use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};
use crate::event::EventRecord;
use crate::parser::parse_line;
use crate::paths;

// ─── SessionLog ───────────────────────────────────────────────────────────

/// The parsed records of one session file, in the order the agent wrote them.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLog {
    path: PathBuf,
    records: Vec<EventRecord>,
}

impl SessionLog {
    /// Read and parse a session file. Every line becomes one record.
    ///
    /// A missing file is `SessionNotFound`; a file with no non-blank content
    /// is `EmptySession`. Nothing is cached: each call re-reads the file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HarnessError::SessionNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(HarnessError::Io(e)),
        };

        if text.trim().is_empty() {
            return Err(HarnessError::EmptySession(path.to_path_buf()));
        }

        Ok(Self::from_text(path, &text))
    }

    /// Parse already-read text. `path` is kept for reporting only.
    pub fn from_text(path: &Path, text: &str) -> Self {
        let records = text
            .lines()
            .enumerate()
            .map(|(i, line)| parse_line(i + 1, line))
            .collect::<Vec<_>>();

        tracing::debug!(path = %path.display(), records = records.len(), "session log parsed");

        SessionLog {
            path: path.to_path_buf(),
            records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ─── SessionStore ─────────────────────────────────────────────────────────

/// Locates session files in an output directory by session id.
///
/// Files are named `session-<id>.jsonl`. The store only reads; the runner
/// that produced a file owns it.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: &Path) -> Self {
        SessionStore {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        paths::session_file(&self.dir, session_id)
    }

    /// Load a session by id. Same failure modes as [`SessionLog::load`].
    pub fn load(&self, session_id: &str) -> Result<SessionLog> {
        SessionLog::load(&self.path_for(session_id))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
