//! Session binding against the in-memory pool and the origin circuit breaker.

mod common;

use common::*;
use std::sync::Arc;

use ranker_core::config::{BinderConfig, OriginBreakerConfig};
use ranker_core::error::BindError;
use ranker_core::models::{EgressEndpoint, SessionResource};
use ranker_core::resilience::OriginCircuitBreaker;
use ranker_core::services::{
    BindRequest, InMemoryProxyDirectory, InMemorySessionStore, MatchType, SessionBinder,
    SessionStore,
};

struct Pool {
    binder: SessionBinder,
    store: Arc<InMemorySessionStore>,
    breaker: Arc<OriginCircuitBreaker>,
}

fn pool(
    sessions: Vec<SessionResource>,
    endpoints: Vec<EgressEndpoint>,
    configure: impl FnOnce(&mut BinderConfig, &mut OriginBreakerConfig),
) -> Pool {
    let mut binder_config = BinderConfig {
        reuse_cooldown_secs: 0,
        ..BinderConfig::default()
    };
    let mut breaker_config = OriginBreakerConfig::default();
    configure(&mut binder_config, &mut breaker_config);

    let store = Arc::new(InMemorySessionStore::with_sessions(sessions));
    let directory = Arc::new(InMemoryProxyDirectory::new(endpoints));
    let breaker = Arc::new(OriginCircuitBreaker::new(breaker_config));
    let binder = SessionBinder::new(store.clone(), directory, breaker.clone(), binder_config);

    Pool {
        binder,
        store,
        breaker,
    }
}

#[tokio::test]
async fn test_exact_ip_match_reported() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30)],
        vec![endpoint("p1:1", "10.1.2.3", 100)],
        |_, _| {},
    );

    let bound = pool.binder.bind_default().await.unwrap();
    assert_eq!(bound.session.id, 1);
    assert_eq!(bound.match_type, MatchType::Exact);
}

#[tokio::test]
async fn test_prefers_fewest_failures_then_newest() {
    let pool = pool(
        vec![
            session(1, "10.1.2.3", 10),
            session(2, "10.1.2.4", 300),
            session(3, "10.1.2.5", 100),
        ],
        vec![endpoint("p1:1", "10.1.2.200", 100)],
        |_, _| {},
    );
    pool.store.record_usage(1, false).await.unwrap();

    let bound = pool.binder.bind_default().await.unwrap();
    assert_eq!(bound.session.id, 3);
    assert_eq!(bound.match_type, MatchType::Subnet);
}

#[tokio::test]
async fn test_session_never_paired_across_subnets_from_directory() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30)],
        vec![endpoint("p1:1", "10.9.9.9", 100)],
        |_, _| {},
    );

    let err = pool.binder.bind_default().await.unwrap_err();
    assert!(matches!(err, BindError::NotAvailable(_)));
}

#[tokio::test]
async fn test_low_quota_endpoints_ignored() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30)],
        vec![
            endpoint("p1:1", "10.1.2.9", 5),
            endpoint("p2:1", "10.1.2.10", 80),
        ],
        |_, _| {},
    );

    let bound = pool.binder.bind_default().await.unwrap();
    assert_eq!(bound.endpoint.address, "p2:1");
}

#[tokio::test]
async fn test_stale_and_cooling_sessions_skipped() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 700), session(2, "10.1.2.4", 30)],
        vec![endpoint("p1:1", "10.1.2.9", 100)],
        |binder, _| binder.reuse_cooldown_secs = 60,
    );

    let bound = pool.binder.bind_default().await.unwrap();
    assert_eq!(bound.session.id, 2);

    // Session 2 was just used and is cooling down; session 1 is too old
    pool.store.record_usage(2, true).await.unwrap();
    let err = pool.binder.bind_default().await.unwrap_err();
    assert!(matches!(err, BindError::NotAvailable(_)));
}

#[tokio::test]
async fn test_excluded_subnet_skipped() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30), session(2, "10.7.7.7", 30)],
        vec![
            endpoint("p1:1", "10.1.2.9", 100),
            endpoint("p2:1", "10.7.7.9", 100),
        ],
        |_, _| {},
    );

    let request = BindRequest::from_config(pool.binder.config()).excluding(vec!["10.1.2".to_string()]);
    for _ in 0..5 {
        let bound = pool.binder.bind(&request).await.unwrap();
        assert_eq!(bound.session.id, 2);
    }
}

#[tokio::test]
async fn test_assigned_endpoint_uses_its_subnet() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30), session(2, "10.7.7.7", 30)],
        Vec::new(),
        |_, _| {},
    );

    let request = BindRequest::from_config(pool.binder.config())
        .with_assigned_endpoint(endpoint("assigned:1", "10.7.7.50", 100));
    let bound = pool.binder.bind(&request).await.unwrap();

    assert_eq!(bound.session.id, 2);
    assert_eq!(bound.endpoint.address, "assigned:1");
    assert_eq!(bound.match_type, MatchType::Subnet);
}

#[tokio::test]
async fn test_assigned_endpoint_random_fallback() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30)],
        Vec::new(),
        |_, _| {},
    );

    let request = BindRequest::from_config(pool.binder.config())
        .with_assigned_endpoint(endpoint("assigned:1", "172.16.0.5", 100));
    let bound = pool.binder.bind(&request).await.unwrap();
    assert_eq!(bound.match_type, MatchType::Random);
    assert_eq!(bound.session.id, 1);

    let excluded = request.clone().excluding(vec!["10.1.2".to_string()]);
    assert!(pool.binder.bind(&excluded).await.is_err());
}

#[tokio::test]
async fn test_random_fallback_can_be_disabled() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30)],
        Vec::new(),
        |binder, _| binder.allow_random_fallback = false,
    );

    let request = BindRequest::from_config(pool.binder.config())
        .with_assigned_endpoint(endpoint("assigned:1", "172.16.0.5", 100));
    let err = pool.binder.bind(&request).await.unwrap_err();
    assert!(matches!(err, BindError::NotAvailable(_)));
}

#[tokio::test]
async fn test_blocked_ip_skipped_for_healthy_sibling() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30)],
        vec![
            endpoint("p1:1", "10.1.2.9", 100),
            endpoint("p2:1", "10.1.2.10", 100),
        ],
        |_, breaker| breaker.failure_threshold = 1,
    );
    pool.breaker.record_failure("10.1.2.9");
    assert!(pool.breaker.is_ip_blocked("10.1.2.9"));

    for _ in 0..5 {
        let bound = pool.binder.bind_default().await.unwrap();
        assert_eq!(bound.endpoint.current_external_ip, "10.1.2.10");
    }
}

#[tokio::test]
async fn test_subnet_block_takes_every_sibling_out() {
    let pool = pool(
        vec![session(1, "10.1.2.3", 30), session(2, "10.7.7.7", 30)],
        vec![
            endpoint("p1:1", "10.1.2.9", 100),
            endpoint("p2:1", "10.1.2.10", 100),
            endpoint("p3:1", "10.7.7.9", 100),
        ],
        |_, breaker| {
            breaker.failure_threshold = 2;
            breaker.subnet_multiplier = 2;
        },
    );

    for ip in ["10.1.2.9", "10.1.2.9", "10.1.2.10"] {
        pool.breaker.record_failure(ip);
    }
    assert!(!pool.breaker.is_subnet_blocked("10.1.2"));
    let record = pool.breaker.record_failure("10.1.2.10");
    assert!(record.subnet_blocked);
    assert_eq!(record.subnet_failures, 4);

    for _ in 0..5 {
        let bound = pool.binder.bind_default().await.unwrap();
        assert_eq!(bound.session.id, 2);
    }

    let request = BindRequest::from_config(pool.binder.config())
        .with_assigned_endpoint(endpoint("assigned:1", "10.1.2.77", 100));
    assert!(pool.binder.bind(&request).await.is_err());
}

#[tokio::test]
async fn test_empty_directory_is_not_available() {
    let pool = pool(vec![session(1, "10.1.2.3", 30)], Vec::new(), |_, _| {});
    let err = pool.binder.bind_default().await.unwrap_err();
    assert!(err.to_string().contains("No usable session/endpoint pair"));
}
