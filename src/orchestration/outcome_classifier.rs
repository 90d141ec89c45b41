//! # Outcome Classifier
//!
//! Decision table applied to a finished [`BatchSearchState`]:
//!
//! 1. a recorded match → `Found`, ranked over every scanned product
//! 2. an access denial or timeout → `Blocked` with its reason
//! 3. the explicit no-results signal → `NoResults`
//! 4. any page whose final status is an error → `Incomplete`
//! 5. otherwise → `NotFound`
//!
//! Unresolved pages may have held the target, so they never count as absence.

use crate::constants::block_reasons;
use crate::matching::assign_ranks;

use super::types::{BatchSearchState, SearchOutcome};

pub struct OutcomeClassifier;

impl OutcomeClassifier {
    pub fn classify(state: &BatchSearchState) -> SearchOutcome {
        if let (Some(found), Some(level)) = (&state.found, state.match_level) {
            let key = found.unique_key();
            let ranked = assign_ranks(&state.all_products);
            if let Some(entry) = ranked.iter().find(|r| r.product.unique_key() == key) {
                return SearchOutcome::Found {
                    match_level: level,
                    rank: entry.rank,
                    page: entry.product.page,
                };
            }
        }

        if state.blocked {
            return SearchOutcome::Blocked {
                reason: state
                    .block_reason
                    .clone()
                    .unwrap_or_else(|| block_reasons::BLOCKED.to_string()),
            };
        }

        if state.no_results {
            return SearchOutcome::NoResults;
        }

        let unresolved_pages = state.unresolved_pages();
        if !unresolved_pages.is_empty() {
            return SearchOutcome::Incomplete { unresolved_pages };
        }

        SearchOutcome::NotFound
    }

    /// Number of distinct products the rank is computed over
    pub fn total_ranked(state: &BatchSearchState) -> usize {
        assign_ranks(&state.all_products).len()
    }
}
