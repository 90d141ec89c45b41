use serde::{Deserialize, Serialize};
use std::fmt;

use super::product::ProductRecord;
use super::session::Cookie;
use crate::constants::block_reasons;

/// Classification of a single result-page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Products extracted
    Ok,
    /// Explicit access denial (HTTP 403, protocol refusal)
    Blocked,
    /// Interstitial bot-defense page
    Challenge,
    /// Unexpected HTTP status
    HttpError,
    /// Connect/TLS/timeout failure
    NetworkError,
    /// The site explicitly reported zero results
    NoResults,
}

impl PageStatus {
    /// Access denial ends the whole search
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Blocked | Self::Challenge)
    }

    /// The page produced no answer; an unresolved page may have held the target
    pub fn is_error(&self) -> bool {
        matches!(self, Self::HttpError | Self::NetworkError)
    }

    /// The page produced a definitive answer about its contents
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Ok | Self::NoResults)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Blocked => "blocked",
            Self::Challenge => "challenge",
            Self::HttpError => "http_error",
            Self::NetworkError => "network_error",
            Self::NoResults => "no_results",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything learned from one fetch of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFetchOutcome {
    pub page: u32,
    pub status: PageStatus,
    pub byte_size: usize,
    pub products: Vec<ProductRecord>,
    /// Cookies set by the response, present even for failed fetches
    pub set_cookies: Vec<Cookie>,
    /// Retry rounds spent before this outcome
    pub retries_used: u32,
    /// Free-form context (`status 502`, transport message, challenge size)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PageFetchOutcome {
    pub fn new(page: u32, status: PageStatus) -> Self {
        Self {
            page,
            status,
            byte_size: 0,
            products: Vec::new(),
            set_cookies: Vec::new(),
            retries_used: 0,
            detail: None,
        }
    }

    pub fn with_products(mut self, products: Vec<ProductRecord>) -> Self {
        self.products = products;
        self
    }

    pub fn with_byte_size(mut self, byte_size: usize) -> Self {
        self.byte_size = byte_size;
        self
    }

    pub fn with_cookies(mut self, set_cookies: Vec<Cookie>) -> Self {
        self.set_cookies = set_cookies;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Reason reported when this page ends the search with an access denial
    pub fn block_reason(&self) -> Option<&'static str> {
        match self.status {
            PageStatus::Challenge => Some(block_reasons::CHALLENGE),
            PageStatus::Blocked
                if self.detail.as_deref() == Some(block_reasons::HTTP2_PROTOCOL_ERROR) =>
            {
                Some(block_reasons::HTTP2_PROTOCOL_ERROR)
            }
            PageStatus::Blocked => Some(block_reasons::BLOCKED),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_groups_are_disjoint() {
        let all = [
            PageStatus::Ok,
            PageStatus::Blocked,
            PageStatus::Challenge,
            PageStatus::HttpError,
            PageStatus::NetworkError,
            PageStatus::NoResults,
        ];
        for status in all {
            let groups = [
                status.is_access_denied(),
                status.is_error(),
                status.is_resolved(),
            ];
            assert_eq!(groups.iter().filter(|g| **g).count(), 1, "{status}");
        }
    }

    #[test]
    fn test_block_reason() {
        let challenge = PageFetchOutcome::new(1, PageStatus::Challenge).with_detail("1200B");
        assert_eq!(challenge.block_reason(), Some("challenge"));

        let reset = PageFetchOutcome::new(1, PageStatus::Blocked).with_detail("http2_protocol_error");
        assert_eq!(reset.block_reason(), Some("http2_protocol_error"));

        let forbidden = PageFetchOutcome::new(1, PageStatus::Blocked).with_detail("status 403");
        assert_eq!(forbidden.block_reason(), Some("blocked"));

        assert_eq!(PageFetchOutcome::new(1, PageStatus::NetworkError).block_reason(), None);
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&PageStatus::NetworkError).unwrap();
        assert_eq!(json, "\"network_error\"");
    }
}
