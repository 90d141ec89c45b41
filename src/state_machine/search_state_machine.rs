//! Transition-validating tracker for a single search.
//!
//! The orchestrator drives the machine; the machine refuses illegal moves and
//! remembers the path so it can be reported in diagnostics.

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::states::SearchState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("Invalid transition for search {search_id}: {from} -> {to}")]
    InvalidTransition {
        search_id: Uuid,
        from: SearchState,
        to: SearchState,
    },
}

#[derive(Debug, Clone)]
pub struct SearchStateMachine {
    search_id: Uuid,
    current: SearchState,
    history: Vec<SearchState>,
}

impl SearchStateMachine {
    pub fn new(search_id: Uuid) -> Self {
        Self {
            search_id,
            current: SearchState::Idle,
            history: vec![SearchState::Idle],
        }
    }

    pub fn current(&self) -> SearchState {
        self.current
    }

    /// Every state visited, starting with `Idle`
    pub fn history(&self) -> &[SearchState] {
        &self.history
    }

    pub fn transition(&mut self, next: SearchState) -> Result<SearchState, StateMachineError> {
        if !self.current.can_transition_to(next) {
            return Err(StateMachineError::InvalidTransition {
                search_id: self.search_id,
                from: self.current,
                to: next,
            });
        }

        debug!(
            search_id = %self.search_id,
            from = %self.current,
            to = %next,
            "Search state transition"
        );

        self.current = next;
        self.history.push(next);
        Ok(next)
    }
}
