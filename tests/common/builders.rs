//! Builders that wire a complete search stack around scripted collaborators.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;

use ranker_core::config::RankerConfig;
use ranker_core::models::{Cookie, CookieJar, EgressEndpoint, SessionResource};
use ranker_core::orchestration::{RankChecker, SearchConfig, TieredSearchOrchestrator};
use ranker_core::resilience::OriginCircuitBreaker;
use ranker_core::services::{InMemoryProxyDirectory, InMemorySessionStore};

use super::mocks::{JsonExtractor, ScriptedTransport};

pub const SESSION_IP: &str = "110.70.27.39";
pub const PROXY_IP: &str = "110.70.27.101";
pub const PROXY_ADDRESS: &str = "proxy-1.local:10001";

/// Active session minted `age_secs` ago from `ip`
pub fn session(id: i64, ip: &str, age_secs: i64) -> SessionResource {
    let jar: CookieJar = vec![
        Cookie::new("PCID", format!("pcid-{id}")),
        Cookie::new("_abck", "minted").with_domain(".coupang.com"),
    ]
    .into_iter()
    .collect();

    SessionResource::new(
        id,
        ip,
        "131.0.6778.86",
        jar,
        Utc::now() - ChronoDuration::seconds(age_secs),
    )
    .expect("test session IP is valid")
}

pub fn endpoint(address: &str, ip: &str, quota: u32) -> EgressEndpoint {
    EgressEndpoint::new(address, ip, quota)
}

/// Configuration tuned for fast, deterministic tests
pub fn test_config() -> RankerConfig {
    let mut config = RankerConfig::default();
    config.search.timeout_budget_ms = 5_000;
    config.binder.reuse_cooldown_secs = 0;
    config
}

/// Everything a search test inspects after the run
pub struct SearchFixture {
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<InMemorySessionStore>,
    pub directory: Arc<InMemoryProxyDirectory>,
    pub breaker: Arc<OriginCircuitBreaker>,
    pub orchestrator: Arc<TieredSearchOrchestrator>,
}

impl SearchFixture {
    pub fn checker(&self) -> RankChecker {
        RankChecker::new(Arc::clone(&self.orchestrator))
    }
}

pub struct SearchFixtureBuilder {
    config: RankerConfig,
    transport: ScriptedTransport,
    sessions: Vec<SessionResource>,
    endpoints: Vec<EgressEndpoint>,
}

impl Default for SearchFixtureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchFixtureBuilder {
    /// One session and one endpoint sharing a /24
    pub fn new() -> Self {
        Self {
            config: test_config(),
            transport: ScriptedTransport::new(),
            sessions: vec![session(1, SESSION_IP, 30)],
            endpoints: vec![endpoint(PROXY_ADDRESS, PROXY_IP, 100)],
        }
    }

    pub fn with_transport(mut self, transport: ScriptedTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_search_config(mut self, configure: impl FnOnce(&mut SearchConfig)) -> Self {
        configure(&mut self.config.search);
        self
    }

    pub fn with_config(mut self, configure: impl FnOnce(&mut RankerConfig)) -> Self {
        configure(&mut self.config);
        self
    }

    pub fn with_sessions(mut self, sessions: Vec<SessionResource>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Vec<EgressEndpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn build(self) -> SearchFixture {
        let transport = Arc::new(self.transport);
        let store = Arc::new(InMemorySessionStore::with_sessions(self.sessions));
        let directory = Arc::new(InMemoryProxyDirectory::new(self.endpoints));
        let breaker = Arc::new(OriginCircuitBreaker::new(
            self.config.circuit_breaker.clone(),
        ));

        let orchestrator = TieredSearchOrchestrator::from_config(
            &self.config,
            transport.clone(),
            Arc::new(JsonExtractor),
            store.clone(),
            directory.clone(),
            breaker.clone(),
        )
        .expect("test configuration is valid");

        SearchFixture {
            transport,
            store,
            directory,
            breaker,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
