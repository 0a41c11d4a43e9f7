use serde::{Deserialize, Serialize};

/// Exit code reported for a run that hit its timeout (matches `timeout(1)`).
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// How an agent subprocess ended.
///
/// A timeout is its own state: the session file keeps whatever was written
/// before the kill, and callers must not confuse it with a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Exited on its own. `code == 0` is a clean exit.
    Exited { code: i32 },
    /// Killed by the harness after `after_secs`.
    TimedOut { after_secs: u64 },
    /// Terminated by a signal the harness did not send.
    Killed { signal: Option<i32> },
}

impl SessionStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionStatus::Exited { code } => *code,
            SessionStatus::TimedOut { .. } => TIMEOUT_EXIT_CODE,
            SessionStatus::Killed { signal } => 128 + signal.unwrap_or(9),
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, SessionStatus::TimedOut { .. })
    }

    pub fn label(&self) -> String {
        match self {
            SessionStatus::Exited { code: 0 } => "completed".to_string(),
            SessionStatus::Exited { code } => format!("exited {code}"),
            SessionStatus::TimedOut { after_secs } => format!("timed out after {after_secs}s"),
            SessionStatus::Killed { signal: Some(s) } => format!("killed by signal {s}"),
            SessionStatus::Killed { signal: None } => "killed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(SessionStatus::Exited { code: 3 }.exit_code(), 3);
        assert_eq!(SessionStatus::TimedOut { after_secs: 1 }.exit_code(), 124);
        assert_eq!(SessionStatus::Killed { signal: Some(15) }.exit_code(), 143);
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_string(&SessionStatus::TimedOut { after_secs: 5 }).unwrap();
        assert_eq!(json, r#"{"state":"timed_out","after_secs":5}"#);
    }
}
