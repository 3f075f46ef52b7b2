//! Container lifecycle state machine
//!
//! The container moves through a fixed set of states with an explicit
//! legal-transition table. Every phase method checks the table before
//! doing any work, so an out-of-order call fails fast with an
//! illegal-state error instead of corrupting the deployment.

use crate::errors::ContainerError;
use std::fmt;

/// Container lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Constructed, no discovery input accepted yet
    Uninitialized,
    /// Accepting descriptors, interceptors and decorators
    Discovering,
    /// Registry closed, walking injection points
    Validating,
    /// Validated and running; resolution and contexts available
    Started,
    /// Tearing down contexts and caches
    ShuttingDown,
    /// Terminal; every further operation fails
    Stopped,
}

impl ContainerState {
    /// Legal-transition table. Validation failure jumps straight to
    /// `Stopped` without passing through `Started`.
    pub fn can_transition_to(self, next: ContainerState) -> bool {
        use ContainerState::*;
        matches!(
            (self, next),
            (Uninitialized, Discovering)
                | (Discovering, Validating)
                | (Validating, Started)
                | (Validating, Stopped)
                | (Started, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ContainerState::Stopped
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerState::Uninitialized => "uninitialized",
            ContainerState::Discovering => "discovering",
            ContainerState::Validating => "validating",
            ContainerState::Started => "started",
            ContainerState::ShuttingDown => "shutting-down",
            ContainerState::Stopped => "stopped",
        }
    }

    /// Move to `next`, or fail without changing state
    pub fn transition(&mut self, next: ContainerState) -> Result<(), ContainerError> {
        if !self.can_transition_to(next) {
            return Err(ContainerError::illegal_state(
                format!("transition to {}", next),
                self.as_str().to_string(),
            ));
        }
        *self = next;
        Ok(())
    }

    /// Guard for operations only legal in one state
    pub fn require(self, expected: ContainerState, operation: &str) -> Result<(), ContainerError> {
        if self != expected {
            return Err(ContainerError::illegal_state(
                operation,
                self.as_str().to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ContainerState {
    fn default() -> Self {
        ContainerState::Uninitialized
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = ContainerState::default();
        state.transition(ContainerState::Discovering).unwrap();
        state.transition(ContainerState::Validating).unwrap();
        state.transition(ContainerState::Started).unwrap();
        state.transition(ContainerState::ShuttingDown).unwrap();
        state.transition(ContainerState::Stopped).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_validation_failure_short_circuits_to_stopped() {
        let mut state = ContainerState::Validating;
        state.transition(ContainerState::Stopped).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_illegal_transition_leaves_state_unchanged() {
        let mut state = ContainerState::Uninitialized;
        let err = state.transition(ContainerState::Started).unwrap_err();
        assert!(matches!(err, ContainerError::IllegalState { .. }));
        assert_eq!(state, ContainerState::Uninitialized);
    }

    #[test]
    fn test_terminal_state_has_no_exits() {
        for next in [
            ContainerState::Uninitialized,
            ContainerState::Discovering,
            ContainerState::Validating,
            ContainerState::Started,
            ContainerState::ShuttingDown,
        ] {
            assert!(!ContainerState::Stopped.can_transition_to(next));
        }
    }

    #[test]
    fn test_require_guard() {
        ContainerState::Started
            .require(ContainerState::Started, "resolve")
            .unwrap();
        let err = ContainerState::Discovering
            .require(ContainerState::Started, "resolve")
            .unwrap_err();
        assert!(err.to_string().contains("resolve"));
    }
}
