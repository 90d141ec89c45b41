//! # Page Fetcher
//!
//! Requests one result page through the transport and classifies the
//! response. Classification rules, in order:
//!
//! | Response                                   | Status          |
//! |--------------------------------------------|-----------------|
//! | transport network failure                  | `network_error` |
//! | transport protocol refusal (stream reset)  | `blocked`       |
//! | HTTP 403                                   | `blocked`       |
//! | HTTP 200, body ≤ `challenge_max_bytes`     | `challenge`     |
//! | HTTP 200, explicit no-results, no products | `no_results`    |
//! | HTTP 200                                   | `ok`            |
//! | anything else                              | `http_error`    |
//!
//! Response cookies are kept whatever the status.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{ConfigurationError, FetchConfig};
use crate::constants::{block_reasons, fetch};
use crate::error::TransportError;
use crate::models::{CookieJar, EgressEndpoint, PageFetchOutcome, PageStatus, SessionFingerprint};
use crate::services::{ProductExtractor, Transport, TransportResponse};

/// Cookie jar shared by every fetch of one search
pub type SharedCookieJar = Arc<Mutex<CookieJar>>;

/// Per-search inputs every page fetch needs
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub search_id: Uuid,
    pub keyword: String,
    pub fingerprint: SessionFingerprint,
    pub endpoint: EgressEndpoint,
    pub cookie_jar: SharedCookieJar,
}

pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn ProductExtractor>,
    base_url: Url,
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn ProductExtractor>,
        config: FetchConfig,
    ) -> Result<Self, ConfigurationError> {
        let base_url = Url::parse(&config.search_base_url).map_err(|e| {
            ConfigurationError::invalid_value(
                "fetch.search_base_url",
                config.search_base_url.clone(),
                e.to_string(),
            )
        })?;

        Ok(Self {
            transport,
            extractor,
            base_url,
            config,
        })
    }

    /// Search URL for one page; `traceId` carries the search id
    pub fn page_url(&self, keyword: &str, page: u32, search_id: &Uuid) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("q", keyword)
            .append_pair("channel", "user")
            .append_pair("listSize", &self.config.list_size.to_string())
            .append_pair("page", &page.to_string())
            .append_pair("traceId", &search_id.to_string());
        url
    }

    /// Fetch and classify one page. Never fails; failures are statuses.
    pub async fn fetch_page(&self, ctx: &FetchContext, page: u32) -> PageFetchOutcome {
        let url = self.page_url(&ctx.keyword, page, &ctx.search_id);
        let cookies = ctx.cookie_jar.lock().to_vec();

        let outcome = match self
            .transport
            .fetch(&url, &cookies, &ctx.fingerprint, &ctx.endpoint)
            .await
        {
            Ok(response) => self.classify(page, response),
            Err(TransportError::Network(message)) => {
                PageFetchOutcome::new(page, PageStatus::NetworkError).with_detail(message)
            }
            Err(TransportError::Protocol(message)) => {
                warn!(
                    search_id = %ctx.search_id,
                    page,
                    error = %message,
                    "Protocol refusal treated as block"
                );
                PageFetchOutcome::new(page, PageStatus::Blocked)
                    .with_detail(block_reasons::HTTP2_PROTOCOL_ERROR)
            }
        };

        debug!(
            search_id = %ctx.search_id,
            page,
            status = %outcome.status,
            bytes = outcome.byte_size,
            products = outcome.products.len(),
            "Page fetched"
        );
        outcome
    }

    fn classify(&self, page: u32, response: TransportResponse) -> PageFetchOutcome {
        let size = response.body.len();
        let base = |status| {
            PageFetchOutcome::new(page, status)
                .with_byte_size(size)
                .with_cookies(response.response_cookies.clone())
        };

        match response.status_code {
            fetch::HTTP_FORBIDDEN => {
                base(PageStatus::Blocked).with_detail(format!("status {}", response.status_code))
            }
            fetch::HTTP_OK if size <= self.config.challenge_max_bytes => {
                base(PageStatus::Challenge).with_detail(format!("{size}B"))
            }
            fetch::HTTP_OK => {
                let extraction = self.extractor.extract_products(&response.body);
                if extraction.explicit_no_results && extraction.products.is_empty() {
                    return base(PageStatus::NoResults);
                }

                let products = extraction
                    .products
                    .into_iter()
                    .zip(1..)
                    .map(|(mut product, position)| {
                        product.page = page;
                        product.position_on_page = position;
                        product
                    })
                    .collect();
                base(PageStatus::Ok).with_products(products)
            }
            other => base(PageStatus::HttpError).with_detail(format!("status {other}")),
        }
    }
}
