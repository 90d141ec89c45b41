//! # Resilience Module
//!
//! Origin-level fault isolation for the egress pool. The defended site burns
//! IPs and whole /24 ranges after repeated failures, so the breaker keeps
//! failure counters per IP and per subnet and temporarily takes either out of
//! rotation once its threshold is reached.
//!
//! ## Usage
//!
//! ```rust
//! use ranker_core::config::OriginBreakerConfig;
//! use ranker_core::resilience::OriginCircuitBreaker;
//!
//! let breaker = OriginCircuitBreaker::new(OriginBreakerConfig::default());
//!
//! for _ in 0..5 {
//!     breaker.record_failure("110.70.27.39");
//! }
//! assert!(breaker.is_blocked("110.70.27.39"));
//! assert!(!breaker.is_blocked("110.70.27.40"));
//! ```

pub mod circuit_breaker;

pub use circuit_breaker::{BlockedScope, FailureCounts, FailureRecord, OriginCircuitBreaker};
