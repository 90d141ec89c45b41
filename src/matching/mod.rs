//! # Matching
//!
//! Pure functions over scanned product records: identity matching against a
//! partial target and dense rank assignment across all scanned pages.

pub mod identity_matcher;
pub mod ranking;

pub use identity_matcher::{match_product, MatchLevel};
pub use ranking::{assign_ranks, RankedProduct};
