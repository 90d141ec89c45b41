use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one tiered search invocation.
///
/// Tier numbers are 1-based. The five terminal states map one-to-one onto
/// the classified outcomes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    /// Created, nothing fetched yet
    Idle,
    /// All pages of the tier are being fetched concurrently
    TierRunning(u32),
    /// Unresolved pages of the tier are being retried one by one
    TierRetrying(u32),
    Found,
    Blocked,
    NoResults,
    Incomplete,
    NotFound,
}

impl SearchState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Found | Self::Blocked | Self::NoResults | Self::Incomplete | Self::NotFound
        )
    }

    /// Check if fetches may be in flight in this state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::TierRunning(_) | Self::TierRetrying(_))
    }

    /// Tier the state refers to, if any
    pub fn tier(&self) -> Option<u32> {
        match self {
            Self::TierRunning(tier) | Self::TierRetrying(tier) => Some(*tier),
            _ => None,
        }
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(&self, next: SearchState) -> bool {
        use SearchState::*;
        match (*self, next) {
            (Idle, TierRunning(1)) => true,
            // Budget can expire before the first request goes out
            (Idle, Blocked) => true,
            (TierRunning(i), TierRetrying(j)) => i == j,
            (TierRunning(i), TierRunning(j)) | (TierRetrying(i), TierRunning(j)) => j == i + 1,
            (TierRunning(_), next) | (TierRetrying(_), next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::TierRunning(tier) => write!(f, "tier_running({tier})"),
            Self::TierRetrying(tier) => write!(f, "tier_retrying({tier})"),
            Self::Found => write!(f, "found"),
            Self::Blocked => write!(f, "blocked"),
            Self::NoResults => write!(f, "no_results"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}
