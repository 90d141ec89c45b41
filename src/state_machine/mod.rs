// Search state machine
//
// Tracks one search from Idle through its tiers to exactly one terminal
// outcome, rejecting transitions the orchestrator must never make.

pub mod search_state_machine;
pub mod states;

pub use search_state_machine::{SearchStateMachine, StateMachineError};
pub use states::SearchState;
