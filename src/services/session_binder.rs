//! # Session Resource Binder
//!
//! Pairs a stored session with an egress endpoint whose current external IP
//! sits in the same /24 as the IP that minted the session. The defended site
//! correlates the two; subnet-level tolerance is as loose as it gets.
//!
//! Selection walks a shuffled endpoint list, skipping origins the circuit
//! breaker has blocked and subnets the caller excluded, and returns the first
//! endpoint with at least one qualifying session. Among qualifying sessions
//! the lowest `fail_count` wins, then the most recently created.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::collaborators::{ProxyDirectory, SessionStore};
use crate::config::BinderConfig;
use crate::error::BindError;
use crate::logging::log_binding_operation;
use crate::models::{same_subnet, EgressEndpoint, SessionResource, SessionStatus};
use crate::resilience::OriginCircuitBreaker;

/// How closely the session's mint-time origin matches the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Same IP
    Exact,
    /// Same /24
    Subnet,
    /// Unconstrained fallback for an externally assigned endpoint
    Random,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Subnet => write!(f, "subnet"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// Constraints for one bind
#[derive(Debug, Clone, PartialEq)]
pub struct BindRequest {
    pub min_remaining_quota: u32,
    pub max_session_age: Duration,
    pub excluded_subnets: HashSet<String>,
    /// Endpoint the caller already holds; endpoint selection is skipped and
    /// sessions are searched for its subnet only
    pub assigned_endpoint: Option<EgressEndpoint>,
}

impl BindRequest {
    pub fn from_config(config: &BinderConfig) -> Self {
        Self {
            min_remaining_quota: config.min_remaining_quota,
            max_session_age: config.max_session_age(),
            excluded_subnets: HashSet::new(),
            assigned_endpoint: None,
        }
    }

    pub fn excluding(mut self, subnets: impl IntoIterator<Item = String>) -> Self {
        self.excluded_subnets.extend(subnets);
        self
    }

    pub fn with_assigned_endpoint(mut self, endpoint: EgressEndpoint) -> Self {
        self.assigned_endpoint = Some(endpoint);
        self
    }
}

/// A session bound to the endpoint it will be presented through
#[derive(Debug, Clone, PartialEq)]
pub struct BoundResource {
    pub session: SessionResource,
    pub endpoint: EgressEndpoint,
    pub match_type: MatchType,
}

impl BoundResource {
    fn classify(session: SessionResource, endpoint: EgressEndpoint) -> Self {
        let match_type = if session.origin_ip == endpoint.current_external_ip {
            MatchType::Exact
        } else if same_subnet(&session.origin_ip, &endpoint.current_external_ip) {
            MatchType::Subnet
        } else {
            MatchType::Random
        };
        Self {
            session,
            endpoint,
            match_type,
        }
    }
}

/// Selects usable (session, endpoint) pairs
pub struct SessionBinder {
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn ProxyDirectory>,
    breaker: Arc<OriginCircuitBreaker>,
    config: BinderConfig,
}

impl SessionBinder {
    pub fn new(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn ProxyDirectory>,
        breaker: Arc<OriginCircuitBreaker>,
        config: BinderConfig,
    ) -> Self {
        Self {
            store,
            directory,
            breaker,
            config,
        }
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    pub fn breaker(&self) -> &Arc<OriginCircuitBreaker> {
        &self.breaker
    }

    /// Bind with the configured defaults
    pub async fn bind_default(&self) -> Result<BoundResource, BindError> {
        self.bind(&BindRequest::from_config(&self.config)).await
    }

    #[instrument(skip(self, request), fields(
        min_quota = request.min_remaining_quota,
        assigned = request.assigned_endpoint.is_some()
    ))]
    pub async fn bind(&self, request: &BindRequest) -> Result<BoundResource, BindError> {
        let bound = match &request.assigned_endpoint {
            Some(endpoint) => self.bind_assigned(endpoint.clone(), request).await?,
            None => self.bind_from_directory(request).await?,
        };

        log_binding_operation(
            "bind",
            Some(bound.session.id),
            Some(bound.endpoint.current_external_ip.as_str()),
            &bound.match_type.to_string(),
            None,
        );
        Ok(bound)
    }

    async fn bind_from_directory(&self, request: &BindRequest) -> Result<BoundResource, BindError> {
        let mut endpoints = self
            .directory
            .list_endpoints(request.min_remaining_quota)
            .await?;
        endpoints.shuffle(&mut rand::rng());

        debug!(endpoints = endpoints.len(), "Evaluating egress endpoints");

        for endpoint in endpoints {
            let subnet = match endpoint.subnet() {
                Ok(subnet) => subnet,
                Err(e) => {
                    warn!(endpoint = %endpoint.address, error = %e, "Skipping endpoint without a usable IP");
                    continue;
                }
            };

            if self.breaker.is_blocked(&endpoint.current_external_ip) {
                debug!(ip = %endpoint.current_external_ip, "Skipping blocked origin");
                continue;
            }

            if request.excluded_subnets.contains(&subnet) {
                debug!(subnet = %subnet, "Skipping excluded subnet");
                continue;
            }

            let mut candidates = self
                .qualifying_sessions(Some(subnet.as_str()), request.max_session_age)
                .await?;
            if !candidates.is_empty() {
                let session = candidates.remove(0);
                info!(
                    session_id = session.id,
                    ip = %endpoint.current_external_ip,
                    subnet = %subnet,
                    "🔗 Session bound to endpoint"
                );
                return Ok(BoundResource::classify(session, endpoint));
            }
        }

        Err(BindError::NotAvailable(
            "no endpoint has a qualifying session in its subnet".to_string(),
        ))
    }

    async fn bind_assigned(
        &self,
        endpoint: EgressEndpoint,
        request: &BindRequest,
    ) -> Result<BoundResource, BindError> {
        let subnet = endpoint
            .subnet()
            .map_err(|e| BindError::NotAvailable(format!("assigned endpoint: {e}")))?;

        if self.breaker.is_blocked(&endpoint.current_external_ip) {
            return Err(BindError::NotAvailable(format!(
                "assigned origin {} is blocked",
                endpoint.current_external_ip
            )));
        }

        let mut candidates = self
            .qualifying_sessions(Some(subnet.as_str()), request.max_session_age)
            .await?;
        if !candidates.is_empty() {
            return Ok(BoundResource::classify(candidates.remove(0), endpoint));
        }

        if !self.config.allow_random_fallback {
            return Err(BindError::NotAvailable(format!(
                "no qualifying session for subnet {subnet}"
            )));
        }

        let mut fallback = self
            .qualifying_sessions(None, request.max_session_age)
            .await?;
        fallback.retain(|s| !request.excluded_subnets.contains(s.origin_subnet()));
        if fallback.is_empty() {
            return Err(BindError::NotAvailable(
                "no qualifying session in the pool".to_string(),
            ));
        }

        let session = fallback.remove(0);
        warn!(
            session_id = session.id,
            session_subnet = %session.origin_subnet(),
            endpoint_subnet = %subnet,
            "Falling back to a session from another subnet"
        );
        Ok(BoundResource::classify(session, endpoint))
    }

    /// Store candidates re-checked against the local filters and ordered by preference
    async fn qualifying_sessions(
        &self,
        subnet: Option<&str>,
        max_age: Duration,
    ) -> Result<Vec<SessionResource>, BindError> {
        let now = Utc::now();
        let mut sessions = self
            .store
            .find_candidates(subnet, max_age, self.config.max_fail_count)
            .await?;

        sessions.retain(|s| self.is_usable(s, subnet, max_age, now));
        sessions.sort_by(|a, b| {
            a.fail_count
                .cmp(&b.fail_count)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(sessions)
    }

    fn is_usable(
        &self,
        session: &SessionResource,
        subnet: Option<&str>,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let cooled_down = session
            .idle_for(now)
            .map_or(true, |idle| idle >= self.config.reuse_cooldown());

        session.status == SessionStatus::Active
            && session.age(now) <= max_age
            && session.fail_count <= self.config.max_fail_count
            && subnet.map_or(true, |wanted| session.origin_subnet() == wanted)
            && cooled_down
    }
}
