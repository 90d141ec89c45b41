//! # System Constants
//!
//! Default thresholds and boundaries for the search core. Every value here is
//! also exposed through [`crate::config::RankerConfig`] so deployments can
//! override it; these are the values used when no configuration file is present.

/// Search tiering and retry defaults
pub mod search {
    /// Last page of each tier except the final one. The final tier runs to `max_page`.
    pub const DEFAULT_TIER_BOUNDARIES: [u32; 2] = [1, 5];
    pub const DEFAULT_MAX_PAGE: u32 = 13;
    /// Upper bound accepted from callers
    pub const MAX_ALLOWED_PAGE: u32 = 20;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 10;
    pub const DEFAULT_TIMEOUT_BUDGET_MS: u64 = 20_000;
    /// Stand-in deadline for budgets past what an `Instant` can hold
    pub const FAR_FUTURE: std::time::Duration = std::time::Duration::from_secs(86_400 * 365 * 30);
}

/// Page fetch defaults
pub mod fetch {
    pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.coupang.com/np/search";
    pub const DEFAULT_LIST_SIZE: u32 = 72;
    /// A 200 response at or below this many bytes is an interstitial challenge page
    pub const DEFAULT_CHALLENGE_MAX_BYTES: usize = 5_000;
    pub const HTTP_OK: u16 = 200;
    pub const HTTP_FORBIDDEN: u16 = 403;
}

/// Session binding defaults
pub mod binder {
    pub const DEFAULT_MIN_REMAINING_QUOTA: u32 = 30;
    pub const DEFAULT_MAX_SESSION_AGE_SECS: u64 = 600;
    pub const DEFAULT_MAX_FAIL_COUNT: u32 = 2;
    pub const DEFAULT_REUSE_COOLDOWN_SECS: u64 = 5;
}

/// Origin circuit breaker defaults
pub mod circuit_breaker {
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    /// Subnet threshold = IP threshold × this multiplier
    pub const DEFAULT_SUBNET_MULTIPLIER: u32 = 2;
    pub const DEFAULT_COOLDOWN_SECS: u64 = 600;
}

/// Block reasons reported on `Blocked` outcomes
pub mod block_reasons {
    pub const BLOCKED: &str = "blocked";
    pub const CHALLENGE: &str = "challenge";
    pub const TIMEOUT: &str = "timeout";
    pub const HTTP2_PROTOCOL_ERROR: &str = "http2_protocol_error";
}

/// Error codes surfaced by the rank checker facade
pub mod error_codes {
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const NO_SESSION: &str = "NO_SESSION";
    pub const BLOCKED: &str = "BLOCKED";
    pub const INCOMPLETE: &str = "INCOMPLETE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}
