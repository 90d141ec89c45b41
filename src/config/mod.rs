//! # Ranker Configuration System
//!
//! YAML-based configuration with environment overlays. Every section has
//! documented defaults, so a missing file or a partial file still yields a
//! complete, validated [`RankerConfig`].
//!
//! ## Architecture
//!
//! - **Single Source of Truth**: `config/ranker-config.yaml`
//! - **Environment Awareness**: `config/environments/<env>.yaml` overrides
//! - **Variable Overrides**: `RANKER__SECTION__FIELD` environment variables win last
//! - **Explicit Validation**: bad values fail loading instead of being clamped
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ranker_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let retries = manager.config().search.max_retries;
//! let budget = manager.config().search.timeout_budget();
//! # let _ = (retries, budget);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;
use crate::orchestration::config::SearchConfig;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring ranker-config.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Tiering, retry and timeout settings for a search
    pub search: SearchConfig,

    /// How result pages are requested and classified
    pub fetch: FetchConfig,

    /// Session/egress binding filters
    pub binder: BinderConfig,

    /// Per-origin circuit breaker thresholds
    pub circuit_breaker: OriginBreakerConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

/// Page request and response-classification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub search_base_url: String,
    pub list_size: u32,
    /// A 200 response at or below this size is treated as a challenge page
    pub challenge_max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            search_base_url: constants::fetch::DEFAULT_SEARCH_BASE_URL.to_string(),
            list_size: constants::fetch::DEFAULT_LIST_SIZE,
            challenge_max_bytes: constants::fetch::DEFAULT_CHALLENGE_MAX_BYTES,
        }
    }
}

/// Session binder filters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Endpoints with less remaining quota than this are ignored
    pub min_remaining_quota: u32,
    pub max_session_age_secs: u64,
    /// Sessions with more failures than this are ignored
    pub max_fail_count: u32,
    /// Sessions used more recently than this are skipped
    pub reuse_cooldown_secs: u64,
    /// Permit an unconstrained session when the assigned endpoint's subnet has none
    pub allow_random_fallback: bool,
}

impl BinderConfig {
    pub fn max_session_age(&self) -> Duration {
        Duration::from_secs(self.max_session_age_secs)
    }

    pub fn reuse_cooldown(&self) -> Duration {
        Duration::from_secs(self.reuse_cooldown_secs)
    }
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            min_remaining_quota: constants::binder::DEFAULT_MIN_REMAINING_QUOTA,
            max_session_age_secs: constants::binder::DEFAULT_MAX_SESSION_AGE_SECS,
            max_fail_count: constants::binder::DEFAULT_MAX_FAIL_COUNT,
            reuse_cooldown_secs: constants::binder::DEFAULT_REUSE_COOLDOWN_SECS,
            allow_random_fallback: true,
        }
    }
}

/// Origin circuit breaker thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginBreakerConfig {
    /// Consecutive failures that block a single IP
    pub failure_threshold: u32,
    /// Subnet threshold is `failure_threshold * subnet_multiplier`
    pub subnet_multiplier: u32,
    pub cooldown_secs: u64,
}

impl OriginBreakerConfig {
    pub fn subnet_threshold(&self) -> u32 {
        self.failure_threshold.saturating_mul(self.subnet_multiplier)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for OriginBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: constants::circuit_breaker::DEFAULT_FAILURE_THRESHOLD,
            subnet_multiplier: constants::circuit_breaker::DEFAULT_SUBNET_MULTIPLIER,
            cooldown_secs: constants::circuit_breaker::DEFAULT_COOLDOWN_SECS,
        }
    }
}

/// Logging output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter directive; falls back to the environment default when unset
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl RankerConfig {
    /// Validate cross-field constraints after loading
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.search.validate()?;

        if self.fetch.search_base_url.is_empty() {
            return Err(ConfigurationError::missing_field(
                "fetch.search_base_url",
                "fetch",
            ));
        }

        if url::Url::parse(&self.fetch.search_base_url).is_err() {
            return Err(ConfigurationError::invalid_value(
                "fetch.search_base_url",
                self.fetch.search_base_url.clone(),
                "must be an absolute URL",
            ));
        }

        if self.fetch.list_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "fetch.list_size",
                "0",
                "list size must be greater than 0",
            ));
        }

        if self.binder.max_session_age_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "binder.max_session_age_secs",
                "0",
                "sessions would never qualify",
            ));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.failure_threshold",
                "0",
                "threshold must be greater than 0",
            ));
        }

        if self.circuit_breaker.subnet_multiplier == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.subnet_multiplier",
                "0",
                "multiplier must be greater than 0",
            ));
        }

        Ok(())
    }
}
