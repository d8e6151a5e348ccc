//! Outside Discovery State Machine
//!
//! Tracks the phases an outside discovery run passes through, from the initial configuration
//! check to the final execution result.

use chrono::{DateTime, Utc};

/// Represents the phases of an outside discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Nothing checked yet
    Unconfigured,
    /// Conflicting configurations handled, target configuration not yet compared
    ConfiguredUnverified,
    /// Target configuration matches the desired destination
    ConfiguredMatching,
    /// Target configuration is missing or differs from the desired destination
    ConfiguredMismatched,
    /// A previous run already succeeded, nothing left to do
    AlreadyExecuted,
    /// The discovery has to be executed
    NotExecuted,
    /// The discovery was executed successfully
    ExecutedSuccess,
    /// The discovery execution failed
    ExecutedFailure,
}

impl std::fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryState::Unconfigured => write!(f, "Unconfigured"),
            DiscoveryState::ConfiguredUnverified => write!(f, "ConfiguredUnverified"),
            DiscoveryState::ConfiguredMatching => write!(f, "ConfiguredMatching"),
            DiscoveryState::ConfiguredMismatched => write!(f, "ConfiguredMismatched"),
            DiscoveryState::AlreadyExecuted => write!(f, "AlreadyExecuted"),
            DiscoveryState::NotExecuted => write!(f, "NotExecuted"),
            DiscoveryState::ExecutedSuccess => write!(f, "ExecutedSuccess"),
            DiscoveryState::ExecutedFailure => write!(f, "ExecutedFailure"),
        }
    }
}

impl DiscoveryState {
    /// Whether no further transition can follow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DiscoveryState::AlreadyExecuted
                | DiscoveryState::ExecutedSuccess
                | DiscoveryState::ExecutedFailure
        )
    }
}

/// State transition information
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: DiscoveryState,
    pub to: DiscoveryState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Tracker for a single outside discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryTracker {
    current: DiscoveryState,
    transitions: Vec<StateTransition>,
}

impl DiscoveryTracker {
    /// Create a new tracker starting in Unconfigured state
    pub fn new() -> Self {
        Self {
            current: DiscoveryState::Unconfigured,
            transitions: Vec::new(),
        }
    }

    /// Get the current state
    pub fn current_state(&self) -> DiscoveryState {
        self.current
    }

    /// Transition to a new state
    pub fn transition_to(&mut self, new_state: DiscoveryState, reason: Option<String>) -> bool {
        if !Self::is_valid_transition(self.current, new_state) {
            tracing::warn!(
                from = %self.current,
                to = %new_state,
                "Invalid outside discovery state transition"
            );
            return false;
        }

        let transition = StateTransition {
            from: self.current,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        };

        tracing::debug!(
            from = %self.current,
            to = %new_state,
            reason = transition.reason.as_deref().unwrap_or(""),
            at = %transition.timestamp.to_rfc3339(),
            "Outside discovery state transition"
        );

        self.current = new_state;
        self.transitions.push(transition);
        true
    }

    /// Check if a state transition is valid
    fn is_valid_transition(from: DiscoveryState, to: DiscoveryState) -> bool {
        use DiscoveryState::*;

        // Self-transition is allowed for non-terminal states
        if from == to {
            return !from.is_terminal();
        }

        matches!(
            (from, to),
            (Unconfigured, ConfiguredUnverified) |
            // Comparing the existing configuration
            (ConfiguredUnverified, ConfiguredMatching) |
            (ConfiguredUnverified, ConfiguredMismatched) |
            // Reconfiguring
            (ConfiguredMismatched, ConfiguredMatching) |
            // Checking the execution history
            (ConfiguredMatching, AlreadyExecuted) |
            (ConfiguredMatching, NotExecuted) |
            // Executing
            (NotExecuted, ExecutedSuccess) |
            (NotExecuted, ExecutedFailure)
        )
    }

    /// Get all recorded transitions, oldest first
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// The path of states visited so far, starting with Unconfigured
    pub fn path(&self) -> Vec<DiscoveryState> {
        let mut path = vec![DiscoveryState::Unconfigured];
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }
}

impl Default for DiscoveryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DiscoveryState::*;

    #[test]
    fn test_initial_state() {
        let tracker = DiscoveryTracker::new();
        assert_eq!(tracker.current_state(), Unconfigured);
        assert!(tracker.transitions().is_empty());
    }

    #[test]
    fn test_reconfigure_and_execute() {
        let mut tracker = DiscoveryTracker::new();

        assert!(tracker.transition_to(ConfiguredUnverified, None));
        assert!(tracker.transition_to(ConfiguredMismatched, None));
        assert!(tracker.transition_to(ConfiguredMatching, Some("reconfigured".to_string())));
        assert!(tracker.transition_to(NotExecuted, None));
        assert!(tracker.transition_to(ExecutedSuccess, None));

        assert_eq!(
            tracker.path(),
            vec![
                Unconfigured,
                ConfiguredUnverified,
                ConfiguredMismatched,
                ConfiguredMatching,
                NotExecuted,
                ExecutedSuccess
            ]
        );
        assert_eq!(tracker.transitions()[2].reason.as_deref(), Some("reconfigured"));

        let stamps: Vec<_> = tracker.transitions().iter().map(|t| t.timestamp).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut tracker = DiscoveryTracker::new();

        // Cannot skip the comparison
        assert!(!tracker.transition_to(NotExecuted, None));
        assert_eq!(tracker.current_state(), Unconfigured);

        tracker.transition_to(ConfiguredUnverified, None);
        tracker.transition_to(ConfiguredMatching, None);
        assert!(tracker.transition_to(AlreadyExecuted, None));

        // Terminal states stay terminal
        assert!(!tracker.transition_to(AlreadyExecuted, None));
        assert!(!tracker.transition_to(NotExecuted, None));
        assert_eq!(tracker.current_state(), AlreadyExecuted);
    }

    #[test]
    fn test_self_transition() {
        let mut tracker = DiscoveryTracker::new();
        tracker.transition_to(ConfiguredUnverified, None);
        tracker.transition_to(ConfiguredMatching, None);
        assert!(tracker.transition_to(ConfiguredMatching, Some("overwrite".to_string())));
        assert_eq!(tracker.transitions().len(), 3);
    }
}
