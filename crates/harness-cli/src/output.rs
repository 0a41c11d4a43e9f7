use harness_core::report::{render_table, Verdict};
use serde::Serialize;

/// Global output flags.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    /// Print `value` as JSON, or the human rendering otherwise.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> anyhow::Result<()> {
        if self.json {
            print_json(value)
        } else {
            if !self.quiet {
                println!("{}", human().trim_end());
            }
            Ok(())
        }
    }

    /// Print a verdict and return its exit code. Failures are printed even
    /// when quiet.
    pub fn verdict(&self, verdict: &Verdict) -> anyhow::Result<i32> {
        if self.json {
            print_json(verdict)?;
        } else if !verdict.passed {
            println!("{}", verdict.summary_line());
        } else if !self.quiet {
            println!("{}", verdict.summary_line());
        }
        Ok(if verdict.passed { 0 } else { 1 })
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}
