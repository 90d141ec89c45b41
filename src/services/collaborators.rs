//! # Collaborator Interfaces
//!
//! The narrow seams through which the search core reaches the outside world.
//! Implementations live elsewhere (HTTP client with browser fingerprinting,
//! HTML extractor, session database, proxy inventory); this crate ships
//! in-memory versions of the store and directory in [`super::memory`].

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::error::{CollaboratorError, TransportError};
use crate::models::{
    Cookie, EgressEndpoint, ProductRecord, SessionFingerprint, SessionId, SessionResource,
};

/// Raw response handed back by the transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
    /// Cookies the response set
    pub response_cookies: Vec<Cookie>,
}

impl TransportResponse {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            body: body.into(),
            response_cookies: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.response_cookies = cookies;
        self
    }
}

/// Performs one network call while presenting the session's browser identity
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        cookies: &[Cookie],
        fingerprint: &SessionFingerprint,
        endpoint: &EgressEndpoint,
    ) -> Result<TransportResponse, TransportError>;
}

/// Products found in one response body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Records in page order. `page` and `position_on_page` are stamped by the fetcher.
    pub products: Vec<ProductRecord>,
    /// The page explicitly says the query has no results
    pub explicit_no_results: bool,
}

/// Turns a response body into product records
pub trait ProductExtractor: Send + Sync {
    fn extract_products(&self, body: &[u8]) -> Extraction;
}

/// Persistent store of minted sessions and their usage statistics
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Active sessions no older than `max_age` with at most `max_fail_count`
    /// failures, restricted to `subnet` when given
    async fn find_candidates(
        &self,
        subnet: Option<&str>,
        max_age: Duration,
        max_fail_count: u32,
    ) -> Result<Vec<SessionResource>, CollaboratorError>;

    async fn record_usage(&self, id: SessionId, success: bool) -> Result<(), CollaboratorError>;

    /// Merge response-set cookies into the stored jar; returns entries changed
    async fn merge_cookies(
        &self,
        id: SessionId,
        cookies: &[Cookie],
    ) -> Result<usize, CollaboratorError>;
}

/// External inventory of egress proxies
#[async_trait]
pub trait ProxyDirectory: Send + Sync {
    async fn list_endpoints(
        &self,
        min_remaining_quota: u32,
    ) -> Result<Vec<EgressEndpoint>, CollaboratorError>;
}
