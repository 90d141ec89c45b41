//! In-memory session store and proxy directory.
//!
//! Process-local implementations of the collaborator traits, used by tests,
//! local runs and any embedding that keeps its pool in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::time::Duration;
use tracing::debug;

use super::collaborators::{ProxyDirectory, SessionStore};
use crate::error::CollaboratorError;
use crate::models::{Cookie, EgressEndpoint, SessionId, SessionResource, SessionStatus};

/// Sessions keyed by id
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, SessionResource>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: impl IntoIterator<Item = SessionResource>) -> Self {
        let store = Self::new();
        for session in sessions {
            store.insert(session);
        }
        store
    }

    /// Add or replace a session, as the minting process would
    pub fn insert(&self, session: SessionResource) {
        self.sessions.insert(session.id, session);
    }

    pub fn get(&self, id: SessionId) -> Option<SessionResource> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    pub fn set_status(&self, id: SessionId, status: SessionStatus) -> Result<(), CollaboratorError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("session {id}")))?;
        session.status = status;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn qualifies(
        session: &SessionResource,
        subnet: Option<&str>,
        max_age: Duration,
        max_fail_count: u32,
        now: DateTime<Utc>,
    ) -> bool {
        session.status == SessionStatus::Active
            && session.fail_count <= max_fail_count
            && session.age(now) <= max_age
            && subnet.map_or(true, |wanted| session.origin_subnet() == wanted)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_candidates(
        &self,
        subnet: Option<&str>,
        max_age: Duration,
        max_fail_count: u32,
    ) -> Result<Vec<SessionResource>, CollaboratorError> {
        let now = Utc::now();
        let candidates: Vec<SessionResource> = self
            .sessions
            .iter()
            .filter(|s| Self::qualifies(s.value(), subnet, max_age, max_fail_count, now))
            .map(|s| s.value().clone())
            .collect();

        debug!(
            subnet = subnet.unwrap_or("*"),
            candidates = candidates.len(),
            "Session candidates loaded"
        );
        Ok(candidates)
    }

    async fn record_usage(&self, id: SessionId, success: bool) -> Result<(), CollaboratorError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("session {id}")))?;
        session.record_use(success, Utc::now());
        Ok(())
    }

    async fn merge_cookies(
        &self,
        id: SessionId,
        cookies: &[Cookie],
    ) -> Result<usize, CollaboratorError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("session {id}")))?;
        Ok(session.cookie_jar.merge(cookies))
    }
}

/// A fixed, replaceable list of egress endpoints
#[derive(Debug, Default)]
pub struct InMemoryProxyDirectory {
    endpoints: RwLock<Vec<EgressEndpoint>>,
}

impl InMemoryProxyDirectory {
    pub fn new(endpoints: Vec<EgressEndpoint>) -> Self {
        Self {
            endpoints: RwLock::new(endpoints),
        }
    }

    pub fn set_endpoints(&self, endpoints: Vec<EgressEndpoint>) {
        *self.endpoints.write() = endpoints;
    }
}

#[async_trait]
impl ProxyDirectory for InMemoryProxyDirectory {
    async fn list_endpoints(
        &self,
        min_remaining_quota: u32,
    ) -> Result<Vec<EgressEndpoint>, CollaboratorError> {
        Ok(self
            .endpoints
            .read()
            .iter()
            .filter(|e| e.remaining_quota >= min_remaining_quota)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CookieJar;
    use chrono::Duration as ChronoDuration;

    fn session(id: SessionId, ip: &str, age_secs: i64) -> SessionResource {
        SessionResource::new(
            id,
            ip,
            "131.0.6778.86",
            CookieJar::new(),
            Utc::now() - ChronoDuration::seconds(age_secs),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_find_candidates_filters() {
        let store = InMemorySessionStore::with_sessions(vec![
            session(1, "10.0.0.1", 10),
            session(2, "10.0.0.2", 900),
            session(3, "10.0.1.1", 10),
            session(4, "10.0.0.4", 10),
        ]);
        store.set_status(4, SessionStatus::Blocked).unwrap();

        let found = store
            .find_candidates(Some("10.0.0"), Duration::from_secs(600), 2)
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1]);

        let any = store
            .find_candidates(None, Duration::from_secs(600), 2)
            .await
            .unwrap();
        assert_eq!(any.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_ceiling_is_inclusive() {
        let store = InMemorySessionStore::with_sessions(vec![session(1, "10.0.0.1", 10)]);
        store.record_usage(1, false).await.unwrap();
        store.record_usage(1, false).await.unwrap();

        let found = store
            .find_candidates(Some("10.0.0"), Duration::from_secs(600), 2)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        store.record_usage(1, false).await.unwrap();
        let found = store
            .find_candidates(Some("10.0.0"), Duration::from_secs(600), 2)
            .await
            .unwrap();
        assert!(found.is_empty());

        let stored = store.get(1).unwrap();
        assert_eq!(stored.use_count, 3);
        assert_eq!(stored.fail_count, 3);
    }

    #[tokio::test]
    async fn test_merge_cookies_and_missing_session() {
        let store = InMemorySessionStore::with_sessions(vec![session(1, "10.0.0.1", 10)]);
        let changed = store
            .merge_cookies(1, &[Cookie::new("PCID", "abc")])
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(store.get(1).unwrap().cookie_jar.value("PCID"), Some("abc"));

        let err = store.record_usage(99, true).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_directory_filters_by_quota() {
        let directory = InMemoryProxyDirectory::new(vec![
            EgressEndpoint::new("p1:8080", "10.0.0.1", 100),
            EgressEndpoint::new("p2:8080", "10.0.0.2", 5),
        ]);
        let endpoints = directory.list_endpoints(30).await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].address, "p1:8080");
    }
}
