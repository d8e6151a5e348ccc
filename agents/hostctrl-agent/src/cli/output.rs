//! Report rendering
//!
//! Renders change reports as highstate-like text blocks or as JSON.

use serde::Serialize;
use std::fmt;

use crate::agent::report::{ChangeReport, StateResult};

/// A report together with the state that produced it
#[derive(Debug, Clone, Serialize)]
pub struct StateRun {
    /// State function, e.g. `system_installed`
    pub function: String,
    #[serde(flatten)]
    pub report: ChangeReport,
}

/// Result of one `apply` run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub test: bool,
    pub states: Vec<StateRun>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.states.iter().filter(|s| s.report.is_failure()).count()
    }

    pub fn changed(&self) -> usize {
        self.states
            .iter()
            .filter(|s| !s.report.is_failure() && !s.report.changes.is_empty())
            .count()
    }
}

/// Highstate-like block of a single state
impl fmt::Display for StateRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = &self.report;
        writeln!(f, "----------")?;
        writeln!(f, "          ID: {}", report.name)?;
        writeln!(f, "    Function: sap_hostctrl.{}", self.function)?;
        writeln!(f, "      Result: {}", report.result)?;
        writeln!(f, "     Comment: {}", report.comment)?;
        writeln!(f, "     Changes:")?;
        if report.changes.is_empty() {
            return Ok(());
        }
        writeln!(f, "              ----------")?;
        for (label, entries) in [("old", &report.changes.old), ("new", &report.changes.new)] {
            if entries.is_empty() {
                continue;
            }
            writeln!(f, "              {}:", label)?;
            for entry in entries {
                writeln!(f, "                  - {}", entry)?;
            }
        }
        Ok(())
    }
}

/// All state blocks followed by the summary
impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for run in &self.states {
            write!(f, "{}", run)?;
        }

        let failed = self.failed();
        let succeeded = self.states.len() - failed;
        writeln!(f)?;
        writeln!(f, "Summary for {}", self.run_id)?;
        writeln!(f, "------------")?;
        writeln!(f, "Succeeded: {} (changed={})", succeeded, self.changed())?;
        writeln!(f, "Failed:    {}", failed)?;
        writeln!(f, "------------")?;
        writeln!(f, "Total states run:     {}", self.states.len())?;
        if self.test {
            let noop = self
                .states
                .iter()
                .filter(|s| s.report.result == StateResult::NoOp)
                .count();
            writeln!(f, "Test mode, states not applied: {}", noop)?;
        }
        Ok(())
    }
}
