//! Loop controller state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{QaLoopError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopState {
    Init,
    Probing,
    Extracting,
    Designing,
    Executing,
    Analyzing,
    Deciding,
    IterationDone,
    RunComplete,
    RunFailed,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::RunComplete | LoopState::RunFailed)
    }

    /// Whether `next` may follow `self`.
    ///
    /// Stages run strictly in order. Any live state may fail; `Probing` may
    /// complete directly when a cancel is observed at the iteration boundary.
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;

        if self.is_terminal() {
            return false;
        }
        if next == RunFailed {
            return true;
        }
        matches!(
            (self, next),
            (Init, Probing)
                | (Probing, Extracting)
                | (Probing, RunComplete)
                | (Extracting, Designing)
                | (Designing, Executing)
                | (Executing, Analyzing)
                | (Analyzing, Deciding)
                | (Deciding, IterationDone)
                | (IterationDone, Probing)
                | (IterationDone, RunComplete)
        )
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Current state plus validated transitions
#[derive(Debug)]
pub struct StateMachine {
    state: LoopState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self { state: LoopState::Init }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Move to `next`, or fail with a contract violation if the move is illegal
    pub fn advance(&mut self, next: LoopState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(QaLoopError::contract(format!(
                "illegal state transition {} -> {}",
                self.state, next
            )));
        }
        tracing::debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        Ok(())
    }

    /// Force the failed state; a no-op once terminal
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = LoopState::RunFailed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoopState::*;

    #[test]
    fn test_full_iteration_path() {
        let mut sm = StateMachine::new();
        for next in [
            Probing,
            Extracting,
            Designing,
            Executing,
            Analyzing,
            Deciding,
            IterationDone,
            Probing,
            Extracting,
        ] {
            sm.advance(next).unwrap();
        }
        assert_eq!(sm.state(), Extracting);
    }

    #[test]
    fn test_stages_cannot_be_skipped() {
        assert!(!Extracting.can_transition_to(Executing));
        assert!(!Probing.can_transition_to(Deciding));
        assert!(!Analyzing.can_transition_to(IterationDone));
        assert!(!Init.can_transition_to(Extracting));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in [Init, Probing, RunComplete, RunFailed] {
            assert!(!RunComplete.can_transition_to(next));
            assert!(!RunFailed.can_transition_to(next));
        }
    }

    #[test]
    fn test_any_live_state_can_fail() {
        for state in [Init, Probing, Extracting, Designing, Executing, Analyzing, Deciding, IterationDone] {
            assert!(state.can_transition_to(RunFailed), "{} -> RunFailed", state);
        }
    }

    #[test]
    fn test_illegal_advance_is_contract_violation() {
        let mut sm = StateMachine::new();
        let err = sm.advance(Deciding).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(sm.state(), Init);
    }

    #[test]
    fn test_fail_is_sticky_after_complete() {
        let mut sm = StateMachine::new();
        sm.advance(Probing).unwrap();
        sm.advance(RunComplete).unwrap();
        sm.fail();
        assert_eq!(sm.state(), RunComplete);
    }
}
