//! Shared types for the search orchestration layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::matching::{match_product, MatchLevel};
use crate::models::{CookieJar, PageFetchOutcome, PageStatus, ProductRecord, SessionId, TargetIdentity};
use crate::services::MatchType;

/// Classified answer of a search, as produced by the outcome classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchOutcome {
    Found {
        match_level: MatchLevel,
        rank: u32,
        page: u32,
    },
    NotFound,
    Blocked {
        reason: String,
    },
    Incomplete {
        unresolved_pages: Vec<u32>,
    },
    NoResults,
}

impl SearchOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Found { .. } => OutcomeKind::Found,
            Self::NotFound => OutcomeKind::NotFound,
            Self::Blocked { .. } => OutcomeKind::Blocked,
            Self::Incomplete { .. } => OutcomeKind::Incomplete,
            Self::NoResults => OutcomeKind::NoResults,
        }
    }
}

/// The five outcome kinds without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Found,
    NotFound,
    Blocked,
    Incomplete,
    NoResults,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Found => "FOUND",
            Self::NotFound => "NOT_FOUND",
            Self::Blocked => "BLOCKED",
            Self::Incomplete => "INCOMPLETE",
            Self::NoResults => "NO_RESULTS",
        };
        f.write_str(s)
    }
}

/// What applying one page outcome did to the search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyEffect {
    /// State updated; keep going
    Continue,
    /// This page carried the first match
    Matched,
    /// This page was an access denial
    Denied,
}

/// Accumulator owned by one in-flight search.
///
/// Only the orchestrator's collecting loop writes to it, one page outcome at
/// a time, so concurrent fetch completions are serialized through that loop.
#[derive(Debug, Clone, Default)]
pub struct BatchSearchState {
    /// Final status per page; a retry overwrites the entry
    pub resolved_pages: BTreeMap<u32, PageStatus>,
    pub all_products: Vec<ProductRecord>,
    /// First match in scan order. Never replaced once set.
    pub found: Option<ProductRecord>,
    pub match_level: Option<MatchLevel>,
    pub blocked: bool,
    pub block_reason: Option<String>,
    /// Transport or status detail of the page that caused the block
    pub block_detail: Option<String>,
    pub no_results: bool,
    pub cumulative_bytes: u64,
    pub cookie_jar_snapshot: CookieJar,
    /// Products per page and retry rounds spent, for diagnostics
    pub page_products: BTreeMap<u32, usize>,
    pub page_retries: BTreeMap<u32, u32>,
}

impl BatchSearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one page outcome into the state
    pub fn apply(
        &mut self,
        outcome: PageFetchOutcome,
        target: &TargetIdentity,
        include_sponsored: bool,
    ) -> ApplyEffect {
        let page = outcome.page;
        self.resolved_pages.insert(page, outcome.status);
        self.cumulative_bytes += outcome.byte_size as u64;
        if outcome.retries_used > 0 {
            self.page_retries.insert(page, outcome.retries_used);
        }

        if let Some(reason) = outcome.block_reason() {
            if !self.blocked {
                self.blocked = true;
                self.block_reason = Some(reason.to_string());
                self.block_detail = outcome.detail.clone();
            }
            return ApplyEffect::Denied;
        }

        let products: Vec<ProductRecord> = outcome
            .products
            .into_iter()
            .filter(|p| include_sponsored || !p.is_sponsored)
            .collect();
        if outcome.status.is_resolved() {
            self.page_products.insert(page, products.len());
        }

        let mut effect = ApplyEffect::Continue;
        if self.found.is_none() {
            let first_match = products
                .iter()
                .find_map(|p| match_product(p, target).map(|level| (p.clone(), level)));
            if let Some((product, level)) = first_match {
                self.found = Some(product);
                self.match_level = Some(level);
                effect = ApplyEffect::Matched;
            }
        }

        self.all_products.extend(products);
        effect
    }

    /// Record a timeout as the block reason unless something else already blocked
    pub fn mark_timed_out(&mut self) {
        if !self.blocked {
            self.blocked = true;
            self.block_reason = Some(crate::constants::block_reasons::TIMEOUT.to_string());
        }
    }

    /// Pages whose latest outcome is an error status
    pub fn unresolved_pages(&self) -> Vec<u32> {
        self.resolved_pages
            .iter()
            .filter(|(_, status)| status.is_error())
            .map(|(page, _)| *page)
            .collect()
    }

    pub fn pages_resolved(&self) -> usize {
        self.resolved_pages
            .values()
            .filter(|status| status.is_resolved())
            .count()
    }

    /// `{"1": "72", "2": "72(r1)", "13": "-1(r3)"}`: product count per page
    /// (`-1` when unresolved) and the retry round it settled on
    pub fn page_counts(&self) -> BTreeMap<String, String> {
        self.resolved_pages
            .iter()
            .map(|(page, status)| {
                let count = if status.is_resolved() {
                    self.page_products.get(page).copied().unwrap_or(0) as i64
                } else {
                    -1
                };
                let value = match self.page_retries.get(page) {
                    Some(retries) => format!("{count}(r{retries})"),
                    None => count.to_string(),
                };
                (page.to_string(), value)
            })
            .collect()
    }
}

/// Diagnostic metadata returned with every search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDiagnostics {
    pub search_id: Uuid,
    pub session_id: SessionId,
    pub match_type: MatchType,
    pub endpoint_ip: String,
    pub endpoint_address: String,
    pub pages_searched: usize,
    pub page_counts: BTreeMap<String, String>,
    pub state_path: Vec<String>,
    pub elapsed_ms: u64,
}

/// Entry-point result: the classified outcome plus the numbers behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub outcome: OutcomeKind,
    pub rank: Option<u32>,
    pub page: Option<u32>,
    pub match_level: Option<MatchLevel>,
    pub found_product: Option<ProductRecord>,
    pub total_products_scanned: usize,
    pub pages_resolved: usize,
    pub block_reason: Option<String>,
    pub block_detail: Option<String>,
    pub unresolved_pages: Vec<u32>,
    pub bytes_transferred: u64,
    pub diagnostics: SearchDiagnostics,
}

impl SearchResult {
    pub fn is_found(&self) -> bool {
        self.outcome == OutcomeKind::Found
    }
}
