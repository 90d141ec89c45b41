//! # Search Orchestration
//!
//! Everything between a search request and a classified answer: page
//! fetching and response classification, the tiered concurrent search, the
//! outcome decision table, and the request/response facade used by work
//! allocation callers.

pub mod config;
pub mod outcome_classifier;
pub mod page_fetcher;
pub mod rank_checker;
pub mod tiered_search;
pub mod types;

pub use config::{SearchConfig, TierConfig};
pub use outcome_classifier::OutcomeClassifier;
pub use page_fetcher::{FetchContext, PageFetcher, SharedCookieJar};
pub use rank_checker::{ErrorInfo, RankCheckRequest, RankCheckResponse, RankChecker, RankData, ResponseMeta};
pub use tiered_search::{SearchRequest, TieredSearchOrchestrator};
pub use types::{
    ApplyEffect, BatchSearchState, OutcomeKind, SearchDiagnostics, SearchOutcome, SearchResult,
};
