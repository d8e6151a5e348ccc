//! Change Reports
//!
//! The result record returned by every state: name, changes, tri-state result and comment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a state
///
/// Serialized as `true`, `false` or `null`, where `null` means that nothing was applied, either
/// because nothing had to change or because the state ran in test mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum StateResult {
    Success,
    Failure,
    NoOp,
}

impl From<StateResult> for Option<bool> {
    fn from(result: StateResult) -> Self {
        match result {
            StateResult::Success => Some(true),
            StateResult::Failure => Some(false),
            StateResult::NoOp => None,
        }
    }
}

impl From<Option<bool>> for StateResult {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => StateResult::Success,
            Some(false) => StateResult::Failure,
            None => StateResult::NoOp,
        }
    }
}

impl fmt::Display for StateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateResult::Success => write!(f, "True"),
            StateResult::Failure => write!(f, "False"),
            StateResult::NoOp => write!(f, "None"),
        }
    }
}

/// What a state changed (or would change)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub old: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new: Vec<String>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.old.is_empty() && self.new.is_empty()
    }

    pub fn clear(&mut self) {
        self.old.clear();
        self.new.clear();
    }
}

/// Result record of one state invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub name: String,
    pub changes: Changes,
    pub result: StateResult,
    pub comment: String,
}

impl ChangeReport {
    /// A new report that fails unless the state decides otherwise
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: Changes::default(),
            result: StateResult::Failure,
            comment: String::new(),
        }
    }

    /// Record a previous state
    pub fn old(&mut self, entry: impl Into<String>) {
        self.changes.old.push(entry.into());
    }

    /// Record a new state
    pub fn new_state(&mut self, entry: impl Into<String>) {
        self.changes.new.push(entry.into());
    }

    /// Finish with a result and comment
    pub fn finish(mut self, result: StateResult, comment: impl Into<String>) -> Self {
        self.result = result;
        self.comment = comment.into();
        self
    }

    /// Finish as failed
    pub fn fail(self, comment: impl Into<String>) -> Self {
        self.finish(StateResult::Failure, comment)
    }

    /// Finish as a no-op with the changes dropped
    pub fn unchanged(mut self, result: StateResult, comment: impl Into<String>) -> Self {
        self.changes.clear();
        self.finish(result, comment)
    }

    pub fn is_failure(&self) -> bool {
        self.result == StateResult::Failure
    }
}
