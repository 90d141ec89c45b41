#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Ranker Core
//!
//! Finds where a target product ranks in a paginated search feed on a
//! bot-defended site.
//!
//! ## Overview
//!
//! The hard part is not the HTTP request. It is scheduling many concurrent,
//! retryable, cancellable page fetches against a pool of short-lived sessions
//! that are only valid from the network origin that minted them, and then
//! telling "the product is not ranked" apart from "we could not see every
//! page".
//!
//! ## Architecture
//!
//! - **Circuit Breaker** ([`resilience`]): consecutive-failure counters per
//!   egress IP and per /24 subnet, with temporary blocks
//! - **Session Binder** ([`services`]): pairs a session with an egress
//!   endpoint in the same subnet as the session's mint-time IP
//! - **Identity Matcher** ([`matching`]): partial-identity matching and
//!   dense rank assignment
//! - **Tiered Search Orchestrator** ([`orchestration`]): concurrent tiers,
//!   cooperative cancellation, sequential retries, outcome classification
//!
//! Network transport, HTML extraction, session persistence and the proxy
//! inventory are collaborators behind the traits in [`services`].
//!
//! ## Module Organization
//!
//! - [`config`] - YAML configuration with environment overlays
//! - [`constants`] - Default thresholds and tier boundaries
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging bootstrap
//! - [`models`] - Sessions, endpoints, products, page outcomes
//! - [`state_machine`] - Search states and transition validation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ranker_core::config::ConfigManager;
//! use ranker_core::models::TargetIdentity;
//! use ranker_core::orchestration::TieredSearchOrchestrator;
//! use ranker_core::resilience::OriginCircuitBreaker;
//! use ranker_core::services::{
//!     InMemoryProxyDirectory, InMemorySessionStore, ProductExtractor, Transport,
//! };
//!
//! # async fn example(
//! #     transport: Arc<dyn Transport>,
//! #     extractor: Arc<dyn ProductExtractor>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_or_default();
//! let config = manager.config();
//!
//! let orchestrator = TieredSearchOrchestrator::from_config(
//!     config,
//!     transport,
//!     extractor,
//!     Arc::new(InMemorySessionStore::new()),
//!     Arc::new(InMemoryProxyDirectory::default()),
//!     Arc::new(OriginCircuitBreaker::new(config.circuit_breaker.clone())),
//! )?;
//!
//! let target = TargetIdentity::new("9024146312")?;
//! let result = orchestrator
//!     .search("test-item", &target, config.search.max_page, None, None)
//!     .await?;
//!
//! println!("{} rank={:?}", result.outcome, result.rank);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod matching;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod services;
pub mod state_machine;

pub use config::{ConfigManager, ConfigurationError, RankerConfig};
pub use error::{
    BindError, CollaboratorError, RankerError, Result, SearchError, TransportError,
};
pub use matching::{match_product, MatchLevel};
pub use models::{
    Cookie, CookieJar, EgressEndpoint, PageFetchOutcome, PageStatus, ProductRecord,
    SessionResource, SessionStatus, TargetIdentity,
};
pub use orchestration::{
    OutcomeKind, RankCheckRequest, RankCheckResponse, RankChecker, SearchConfig, SearchOutcome,
    SearchResult, TierConfig, TieredSearchOrchestrator,
};
pub use resilience::OriginCircuitBreaker;
pub use services::{BindRequest, BoundResource, MatchType, SessionBinder};
pub use state_machine::SearchState;
