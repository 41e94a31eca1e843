//! Per-package publish state machine
//!
//! Every package in a release walks
//! `Pending -> Publishing -> WaitingResolvable -> Resolvable`, or ends early
//! in `Failed`, `Skipped` or `Cancelled`. Transitions are validated and
//! timestamped so the report can show how each package got where it ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Publishing state of a single package
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    Pending,
    Publishing,
    WaitingResolvable,
    Resolvable,
    Failed,
    Skipped,
    Cancelled,
}

impl PackageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageState::Pending => "pending",
            PackageState::Publishing => "publishing",
            PackageState::WaitingResolvable => "waiting_resolvable",
            PackageState::Resolvable => "resolvable",
            PackageState::Failed => "failed",
            PackageState::Skipped => "skipped",
            PackageState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PackageState::Resolvable
                | PackageState::Failed
                | PackageState::Skipped
                | PackageState::Cancelled
        )
    }

    /// Whether `self -> to` is an edge of the state machine
    pub fn can_transition_to(&self, to: PackageState) -> bool {
        use PackageState::*;

        matches!(
            (self, to),
            (Pending, Publishing)
                | (Pending, Skipped)
                | (Pending, Cancelled)
                | (Publishing, WaitingResolvable)
                | (Publishing, Failed)
                | (Publishing, Cancelled)
                | (WaitingResolvable, Resolvable)
                | (WaitingResolvable, Failed)
                | (WaitingResolvable, Cancelled)
        )
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: PackageState,
    pub to: PackageState,
    pub timestamp: DateTime<Utc>,
}

/// Attempted a transition that is not an edge of the state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{package}] illegal transition {from} -> {to}")]
pub struct InvalidTransition {
    pub package: String,
    pub from: PackageState,
    pub to: PackageState,
}

/// State machine tracking one package through a release
#[derive(Debug, Clone)]
pub struct PackageStateMachine {
    package: String,
    current_state: PackageState,
    transitions: Vec<StateTransition>,
}

impl PackageStateMachine {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            current_state: PackageState::Pending,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state
    pub fn transition(&mut self, to: PackageState) -> Result<(), InvalidTransition> {
        if !self.current_state.can_transition_to(to) {
            return Err(InvalidTransition {
                package: self.package.clone(),
                from: self.current_state,
                to,
            });
        }

        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
        });
        self.current_state = to;

        Ok(())
    }

    pub fn state(&self) -> PackageState {
        self.current_state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_machine() {
        let machine = PackageStateMachine::new("core@0.1.0");

        assert_eq!(machine.state(), PackageState::Pending);
        assert!(!machine.state().is_terminal());
        assert!(machine.transitions().is_empty());
    }

    #[test]
    fn test_happy_path() {
        let mut machine = PackageStateMachine::new("core@0.1.0");

        machine.transition(PackageState::Publishing).unwrap();
        machine.transition(PackageState::WaitingResolvable).unwrap();
        machine.transition(PackageState::Resolvable).unwrap();

        assert_eq!(machine.state(), PackageState::Resolvable);
        assert!(machine.state().is_terminal());
        assert_eq!(machine.transitions().len(), 3);
    }

    #[test]
    fn test_cannot_skip_waiting_resolvable() {
        let mut machine = PackageStateMachine::new("core@0.1.0");
        machine.transition(PackageState::Publishing).unwrap();

        let error = machine.transition(PackageState::Resolvable).unwrap_err();

        assert_eq!(error.from, PackageState::Publishing);
        assert_eq!(error.to, PackageState::Resolvable);
        assert_eq!(machine.state(), PackageState::Publishing);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [
            PackageState::Resolvable,
            PackageState::Failed,
            PackageState::Skipped,
            PackageState::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                PackageState::Pending,
                PackageState::Publishing,
                PackageState::WaitingResolvable,
                PackageState::Resolvable,
                PackageState::Failed,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_pending_can_only_be_skipped_or_cancelled_without_publishing() {
        assert!(PackageState::Pending.can_transition_to(PackageState::Skipped));
        assert!(PackageState::Pending.can_transition_to(PackageState::Cancelled));
        assert!(!PackageState::Pending.can_transition_to(PackageState::Failed));
        assert!(!PackageState::Pending.can_transition_to(PackageState::WaitingResolvable));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&PackageState::WaitingResolvable).unwrap();
        assert_eq!(json, r#""waiting_resolvable""#);
        assert_eq!(PackageState::WaitingResolvable.to_string(), "waiting_resolvable");
    }

    #[test]
    fn test_transitions_record_each_edge() {
        let mut machine = PackageStateMachine::new("core@0.1.0");
        machine.transition(PackageState::Publishing).unwrap();
        machine.transition(PackageState::Failed).unwrap();

        let edges: Vec<_> = machine.transitions().iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            edges,
            vec![
                (PackageState::Pending, PackageState::Publishing),
                (PackageState::Publishing, PackageState::Failed),
            ]
        );
        assert!(machine.transitions()[0].timestamp <= machine.transitions()[1].timestamp);
    }
}
