//! Skill invocations: calls to the `Skill` pseudo-tool, keyed on the
//! `skill` input rather than the tool name.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::event::EventRecord;
use crate::session::SessionLog;

pub const SKILL_TOOL: &str = "Skill";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SkillInvocation<'a> {
    pub skill_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<&'a Value>,
    pub line: usize,
}

pub fn skill_invocations(log: &SessionLog) -> impl Iterator<Item = SkillInvocation<'_>> {
    log.records()
        .iter()
        .flat_map(EventRecord::tool_calls)
        .filter(|c| c.name == SKILL_TOOL)
        .filter_map(|c| {
            let input = c.input?;
            Some(SkillInvocation {
                skill_name: input.get("skill").and_then(Value::as_str)?,
                args: input.get("args"),
                line: c.record.line,
            })
        })
}

pub fn was_skill_invoked(log: &SessionLog, skill_name: &str) -> bool {
    skill_invocations(log).any(|s| s.skill_name == skill_name)
}

pub fn count_skill_invocations(log: &SessionLog, skill_name: &str) -> usize {
    skill_invocations(log)
        .filter(|s| s.skill_name == skill_name)
        .count()
}

pub fn list_skills_invoked(log: &SessionLog) -> BTreeSet<String> {
    skill_invocations(log)
        .map(|s| s.skill_name.to_string())
        .collect()
}

/// Expected-vs-actual skill sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillComparison {
    pub found: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    /// Invoked but not expected. Reported, never a failure.
    pub extra: BTreeSet<String>,
}

impl SkillComparison {
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn compare_expected_skills(log: &SessionLog, expected: &BTreeSet<String>) -> SkillComparison {
    let actual = list_skills_invoked(log);
    SkillComparison {
        found: expected.intersection(&actual).cloned().collect(),
        missing: expected.difference(&actual).cloned().collect(),
        extra: actual.difference(expected).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn log(lines: &[&str]) -> SessionLog {
        SessionLog::from_text(Path::new("test.jsonl"), &lines.join("\n"))
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn skill_line(name: &str) -> String {
        format!(r#"{{"type":"tool_use","name":"Skill","input":{{"skill":"{name}"}}}}"#)
    }

    #[test]
    fn lists_and_counts_skills() {
        let a = skill_line("pytest");
        let b = skill_line("ruff");
        let log = log(&[a.as_str(), b.as_str(), a.as_str()]);
        assert_eq!(list_skills_invoked(&log), set(&["pytest", "ruff"]));
        assert_eq!(count_skill_invocations(&log, "pytest"), 2);
        assert!(was_skill_invoked(&log, "ruff"));
        assert!(!was_skill_invoked(&log, "mypy"));
    }

    #[test]
    fn nested_skill_calls_with_args() {
        let log = log(&[
            r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t1","name":"Skill","input":{"skill":"terraform","args":"plan"}}]}}"#,
        ]);
        let inv: Vec<_> = skill_invocations(&log).collect();
        assert_eq!(inv.len(), 1);
        assert_eq!(inv[0].skill_name, "terraform");
        assert_eq!(inv[0].args, Some(&Value::String("plan".into())));
    }

    #[test]
    fn skill_call_without_skill_input_is_ignored() {
        let log = log(&[r#"{"type":"tool_use","name":"Skill","input":{}}"#]);
        assert!(list_skills_invoked(&log).is_empty());
    }

    #[test]
    fn comparison_found_missing_extra() {
        let a = skill_line("a");
        let c = skill_line("c");
        let log = log(&[a.as_str(), c.as_str()]);
        let cmp = compare_expected_skills(&log, &set(&["a", "b"]));
        assert_eq!(cmp.found, set(&["a"]));
        assert_eq!(cmp.missing, set(&["b"]));
        assert_eq!(cmp.extra, set(&["c"]));
        assert!(!cmp.passed());
    }

    #[test]
    fn extra_skills_do_not_fail() {
        let a = skill_line("a");
        let c = skill_line("c");
        let log = log(&[a.as_str(), c.as_str()]);
        let cmp = compare_expected_skills(&log, &set(&["a"]));
        assert!(cmp.passed());
        assert_eq!(cmp.extra, set(&["c"]));
    }
}
