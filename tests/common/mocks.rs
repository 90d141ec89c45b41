//! Scripted collaborators for driving searches without a network.
//!
//! Result pages are encoded as JSON and padded past the challenge-size
//! threshold so the fetcher classifies them as real pages.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use url::Url;

use ranker_core::error::TransportError;
use ranker_core::models::{Cookie, EgressEndpoint, ProductRecord, SessionFingerprint};
use ranker_core::services::{Extraction, ProductExtractor, Transport, TransportResponse};

/// Smallest body the scripted transport emits for a real result page
const PAGE_BODY_MIN_BYTES: usize = 6_000;

#[derive(Debug, Serialize, Deserialize)]
struct PageBody {
    #[serde(default)]
    no_results: bool,
    products: Vec<ProductRecord>,
}

/// One canned transport reply
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub delay: Duration,
    pub result: Result<TransportResponse, TransportError>,
}

impl ScriptedResponse {
    pub fn ok(response: TransportResponse) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(response),
        }
    }

    pub fn err(error: TransportError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        if let Ok(response) = &mut self.result {
            response.response_cookies = cookies;
        }
        self
    }
}

fn encode(body: &PageBody) -> Vec<u8> {
    let mut bytes = serde_json::to_vec(body).expect("page body serializes");
    if bytes.len() < PAGE_BODY_MIN_BYTES {
        bytes.resize(PAGE_BODY_MIN_BYTES, b' ');
    }
    bytes
}

/// A 200 result page holding `products` in order
pub fn results(products: Vec<ProductRecord>) -> ScriptedResponse {
    let body = PageBody {
        no_results: false,
        products,
    };
    ScriptedResponse::ok(TransportResponse::new(200, encode(&body)))
}

/// A 200 page on which the site says the query matched nothing
pub fn no_results() -> ScriptedResponse {
    let body = PageBody {
        no_results: true,
        products: Vec::new(),
    };
    ScriptedResponse::ok(TransportResponse::new(200, encode(&body)))
}

/// A small 200 interstitial
pub fn challenge() -> ScriptedResponse {
    ScriptedResponse::ok(TransportResponse::new(200, vec![b'x'; 1_200]))
}

pub fn http_status(status_code: u16) -> ScriptedResponse {
    ScriptedResponse::ok(TransportResponse::new(status_code, b"<html>error</html>".to_vec()))
}

pub fn network_error(message: &str) -> ScriptedResponse {
    ScriptedResponse::err(TransportError::Network(message.to_string()))
}

pub fn stream_reset() -> ScriptedResponse {
    ScriptedResponse::err(TransportError::Protocol("RST_STREAM".to_string()))
}

/// `count` filler products for one page, ids `p{page}-{position}`
pub fn filler_products(page: u32, count: u32) -> Vec<ProductRecord> {
    (1..=count)
        .map(|position| {
            ProductRecord::new(format!("p{page}-{position}"), 0, 0)
                .with_item_id(format!("i{page}-{position}"))
                .with_vendor_item_id(format!("v{page}-{position}"))
        })
        .collect()
}

/// Filler page with `product` placed at the 1-based `position`
pub fn page_with(page: u32, count: u32, position: u32, product: ProductRecord) -> Vec<ProductRecord> {
    let mut products = filler_products(page, count);
    products[(position - 1) as usize] = product;
    products
}

/// One request the transport saw
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub page: u32,
    pub cookies: Vec<Cookie>,
    pub session_id: i64,
    pub endpoint_ip: String,
}

/// Replays per-page scripts. The last response of a page's script repeats;
/// pages without a script get the fallback.
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<u32, VecDeque<ScriptedResponse>>>,
    fallback: ScriptedResponse,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Unscripted pages come back as empty result pages
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: results(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, fallback: ScriptedResponse) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn page(self, page: u32, response: ScriptedResponse) -> Self {
        self.page_sequence(page, vec![response])
    }

    /// Successive fetches of `page` get successive responses. Replaces any
    /// earlier script for the page.
    pub fn page_sequence(self, page: u32, responses: Vec<ScriptedResponse>) -> Self {
        self.scripts.lock().insert(page, VecDeque::from(responses));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.calls.lock().iter().map(|c| c.page).collect();
        pages.sort_unstable();
        pages
    }

    pub fn fetch_count(&self, page: u32) -> usize {
        self.calls.lock().iter().filter(|c| c.page == page).count()
    }

    fn next_response(&self, page: u32) -> ScriptedResponse {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(&page) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| self.fallback.clone()),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

fn page_param(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(
        &self,
        url: &Url,
        cookies: &[Cookie],
        fingerprint: &SessionFingerprint,
        endpoint: &EgressEndpoint,
    ) -> Result<TransportResponse, TransportError> {
        let page = page_param(url);
        self.calls.lock().push(RecordedCall {
            page,
            cookies: cookies.to_vec(),
            session_id: fingerprint.session_id,
            endpoint_ip: endpoint.current_external_ip.clone(),
        });

        let scripted = self.next_response(page);
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result
    }
}

/// Decodes the scripted transport's JSON page bodies
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExtractor;

impl ProductExtractor for JsonExtractor {
    fn extract_products(&self, body: &[u8]) -> Extraction {
        match serde_json::from_slice::<PageBody>(body) {
            Ok(page) => Extraction {
                products: page.products,
                explicit_no_results: page.no_results,
            },
            Err(_) => Extraction::default(),
        }
    }
}
