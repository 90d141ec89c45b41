//! # Origin Circuit Breaker
//!
//! Tracks consecutive failures per egress IP and per /24 subnet. A scope is
//! blocked once its counter reaches the threshold and stays blocked for the
//! cool-down window. An expired block clears itself the next time the scope is
//! inspected, but the counter survives it: the next failure re-blocks at once.
//!
//! A success resets the IP counter but only decrements the subnet counter, so
//! one good response under a mostly-bad range does not reopen the range.

use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::OriginBreakerConfig;
use crate::models::subnet_of;

/// Counter and block deadline for one IP or subnet
#[derive(Debug, Clone, Copy, Default)]
struct ScopeEntry {
    consecutive_failures: u32,
    blocked_until: Option<Instant>,
}

impl ScopeEntry {
    /// Clears an elapsed block and reports whether the scope is still blocked.
    /// The failure counter is left alone.
    fn refresh(&mut self, now: Instant) -> bool {
        match self.blocked_until {
            Some(until) if until > now => true,
            Some(_) => {
                self.blocked_until = None;
                false
            }
            None => false,
        }
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.blocked_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

/// Result of [`OriginCircuitBreaker::record_failure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// The IP is blocked after this failure
    pub ip_blocked: bool,
    /// The IP's subnet is blocked after this failure
    pub subnet_blocked: bool,
    pub ip_failures: u32,
    pub subnet_failures: u32,
}

/// Current counters for an IP and its subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FailureCounts {
    pub ip: u32,
    pub subnet: u32,
}

/// A scope that is currently blocked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedScope {
    pub scope: String,
    pub consecutive_failures: u32,
    pub remaining: Duration,
}

/// Per-IP and per-subnet circuit breaker.
///
/// Shared by reference (`Arc`) between the binder and the orchestrator. Every
/// update to one scope happens under that scope's map entry lock.
#[derive(Debug)]
pub struct OriginCircuitBreaker {
    config: OriginBreakerConfig,
    ips: DashMap<String, ScopeEntry>,
    subnets: DashMap<String, ScopeEntry>,
}

impl OriginCircuitBreaker {
    pub fn new(config: OriginBreakerConfig) -> Self {
        info!(
            ip_threshold = config.failure_threshold,
            subnet_threshold = config.subnet_threshold(),
            cooldown_secs = config.cooldown_secs,
            "🛡️ Origin circuit breaker initialized"
        );

        Self {
            config,
            ips: DashMap::new(),
            subnets: DashMap::new(),
        }
    }

    pub fn config(&self) -> &OriginBreakerConfig {
        &self.config
    }

    /// Record one failed search through `ip`
    pub fn record_failure(&self, ip: &str) -> FailureRecord {
        let now = Instant::now();
        let cooldown = self.config.cooldown();

        let (ip_blocked, ip_failures) = {
            let mut entry = self.ips.entry(ip.to_string()).or_default();
            let was_blocked = entry.refresh(now);
            entry.consecutive_failures += 1;
            if !was_blocked && entry.consecutive_failures >= self.config.failure_threshold {
                entry.blocked_until = Some(now + cooldown);
                warn!(
                    ip = %ip,
                    failures = entry.consecutive_failures,
                    cooldown_secs = cooldown.as_secs(),
                    "🚫 IP blocked after consecutive failures"
                );
            }
            (entry.blocked_until.is_some(), entry.consecutive_failures)
        };

        let (subnet_blocked, subnet_failures) = match subnet_of(ip) {
            Ok(subnet) => {
                let mut entry = self.subnets.entry(subnet.clone()).or_default();
                let was_blocked = entry.refresh(now);
                entry.consecutive_failures += 1;
                if !was_blocked && entry.consecutive_failures >= self.config.subnet_threshold() {
                    entry.blocked_until = Some(now + cooldown);
                    warn!(
                        subnet = %subnet,
                        failures = entry.consecutive_failures,
                        cooldown_secs = cooldown.as_secs(),
                        "🚫 Subnet blocked after consecutive failures"
                    );
                }
                (entry.blocked_until.is_some(), entry.consecutive_failures)
            }
            Err(e) => {
                warn!(ip = %ip, error = %e, "Failure recorded for IP without a subnet");
                (false, 0)
            }
        };

        debug!(
            ip = %ip,
            ip_failures,
            subnet_failures,
            "🔴 Origin failure recorded"
        );

        FailureRecord {
            ip_blocked,
            subnet_blocked,
            ip_failures,
            subnet_failures,
        }
    }

    /// Record one successful search through `ip`.
    ///
    /// The IP counter and any IP block are cleared. The subnet counter drops by
    /// one; an active subnet block stays until its cool-down elapses.
    pub fn record_success(&self, ip: &str) {
        if let Some(mut entry) = self.ips.get_mut(ip) {
            if entry.blocked_until.is_some() {
                info!(ip = %ip, "🟢 IP block cleared by success");
            }
            *entry = ScopeEntry::default();
        }

        if let Ok(subnet) = subnet_of(ip) {
            if let Some(mut entry) = self.subnets.get_mut(&subnet) {
                entry.consecutive_failures = entry.consecutive_failures.saturating_sub(1);
            }
        }

        debug!(ip = %ip, "🟢 Origin success recorded");
    }

    /// Whether `ip` or its subnet is currently blocked
    pub fn is_blocked(&self, ip: &str) -> bool {
        if self.is_ip_blocked(ip) {
            return true;
        }
        subnet_of(ip)
            .map(|subnet| self.is_subnet_blocked(&subnet))
            .unwrap_or(false)
    }

    pub fn is_ip_blocked(&self, ip: &str) -> bool {
        Self::check_scope(&self.ips, ip)
    }

    pub fn is_subnet_blocked(&self, subnet: &str) -> bool {
        Self::check_scope(&self.subnets, subnet)
    }

    fn check_scope(map: &DashMap<String, ScopeEntry>, key: &str) -> bool {
        map.get_mut(key)
            .map(|mut entry| entry.refresh(Instant::now()))
            .unwrap_or(false)
    }

    pub fn failure_counts(&self, ip: &str) -> FailureCounts {
        let ip_count = self
            .ips
            .get(ip)
            .map(|e| e.consecutive_failures)
            .unwrap_or(0);
        let subnet_count = subnet_of(ip)
            .ok()
            .and_then(|subnet| self.subnets.get(&subnet).map(|e| e.consecutive_failures))
            .unwrap_or(0);

        FailureCounts {
            ip: ip_count,
            subnet: subnet_count,
        }
    }

    pub fn blocked_ips(&self) -> Vec<BlockedScope> {
        Self::collect_blocked(&self.ips)
    }

    pub fn blocked_subnets(&self) -> Vec<BlockedScope> {
        Self::collect_blocked(&self.subnets)
    }

    fn collect_blocked(map: &DashMap<String, ScopeEntry>) -> Vec<BlockedScope> {
        let now = Instant::now();
        let mut blocked: Vec<BlockedScope> = map
            .iter()
            .filter_map(|item| {
                item.value().remaining(now).map(|remaining| BlockedScope {
                    scope: item.key().clone(),
                    consecutive_failures: item.value().consecutive_failures,
                    remaining,
                })
            })
            .collect();
        blocked.sort_by(|a, b| a.scope.cmp(&b.scope));
        blocked
    }

    /// Forget all counters and blocks
    pub fn clear(&self) {
        self.ips.clear();
        self.subnets.clear();
        info!("🧹 Origin circuit breaker cleared");
    }
}

impl Default for OriginCircuitBreaker {
    fn default() -> Self {
        Self::new(OriginBreakerConfig::default())
    }
}
